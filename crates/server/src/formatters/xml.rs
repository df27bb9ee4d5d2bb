use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

use northwind_core::config::XmlFlavor;
use northwind_core::domain::customer::{Customer, CustomerInput, CUSTOMER_FIELDS};

use crate::errors::ErrorDetail;

pub const CONTRACT_NAMESPACE: &str =
    "http://schemas.datacontract.org/2004/07/NorthwindService.Models";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

const CUSTOMER_ELEMENT: &str = "Customer";
const COLLECTION_ELEMENT: &str = "ArrayOfCustomer";

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("could not write xml: {0}")]
    Write(String),
    #[error("malformed xml: {0}")]
    Read(String),
    #[error("expected root element `{expected}`, found `{found}`")]
    UnexpectedRoot { expected: &'static str, found: String },
    #[error("document has no root element")]
    MissingRoot,
    #[error("element `{0}` must not contain child elements")]
    Nested(String),
    #[error("content follows the root element")]
    TrailingContent,
}

type XmlWriter = Writer<Vec<u8>>;

fn write(writer: &mut XmlWriter, event: Event<'_>) -> Result<(), XmlError> {
    writer.write_event(event).map_err(|error| XmlError::Write(error.to_string()))
}

fn root_start(name: &str, flavor: XmlFlavor) -> BytesStart<'_> {
    let start = BytesStart::new(name);
    match flavor {
        XmlFlavor::Contract => {
            start.with_attributes([("xmlns:i", XSI_NAMESPACE), ("xmlns", CONTRACT_NAMESPACE)])
        }
        XmlFlavor::Reflection => {
            start.with_attributes([("xmlns:xsi", XSI_NAMESPACE), ("xmlns:xsd", XSD_NAMESPACE)])
        }
    }
}

fn open_document(flavor: XmlFlavor) -> Result<XmlWriter, XmlError> {
    let mut writer = Writer::new(Vec::new());
    if flavor == XmlFlavor::Reflection {
        write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    }
    Ok(writer)
}

fn finish(writer: XmlWriter) -> Result<String, XmlError> {
    String::from_utf8(writer.into_inner()).map_err(|error| XmlError::Write(error.to_string()))
}

fn write_text_element(writer: &mut XmlWriter, name: &str, value: &str) -> Result<(), XmlError> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    write(writer, Event::Text(BytesText::new(value)))?;
    write(writer, Event::End(BytesEnd::new(name)))
}

/// Members of one customer. Contract style sorts by name and writes nils,
/// reflection style keeps declaration order and skips absent values.
fn write_members(
    writer: &mut XmlWriter,
    customer: &Customer,
    flavor: XmlFlavor,
) -> Result<(), XmlError> {
    let mut fields = customer.wire_fields();
    if flavor == XmlFlavor::Contract {
        fields.sort_by_key(|(name, _)| *name);
    }

    for (name, value) in fields {
        match (value, flavor) {
            (Some(value), _) => write_text_element(writer, name, value)?,
            (None, XmlFlavor::Contract) => {
                let nil = BytesStart::new(name).with_attributes([("i:nil", "true")]);
                write(writer, Event::Empty(nil))?;
            }
            (None, XmlFlavor::Reflection) => {}
        }
    }
    Ok(())
}

pub fn encode_customer(customer: &Customer, flavor: XmlFlavor) -> Result<String, XmlError> {
    let mut writer = open_document(flavor)?;
    write(&mut writer, Event::Start(root_start(CUSTOMER_ELEMENT, flavor)))?;
    write_members(&mut writer, customer, flavor)?;
    write(&mut writer, Event::End(BytesEnd::new(CUSTOMER_ELEMENT)))?;
    finish(writer)
}

pub fn encode_customers(customers: &[Customer], flavor: XmlFlavor) -> Result<String, XmlError> {
    let mut writer = open_document(flavor)?;
    write(&mut writer, Event::Start(root_start(COLLECTION_ELEMENT, flavor)))?;
    for customer in customers {
        write(&mut writer, Event::Start(BytesStart::new(CUSTOMER_ELEMENT)))?;
        write_members(&mut writer, customer, flavor)?;
        write(&mut writer, Event::End(BytesEnd::new(CUSTOMER_ELEMENT)))?;
    }
    write(&mut writer, Event::End(BytesEnd::new(COLLECTION_ELEMENT)))?;
    finish(writer)
}

pub fn encode_error(detail: &ErrorDetail) -> Result<String, XmlError> {
    let mut writer = Writer::new(Vec::new());
    write(&mut writer, Event::Start(BytesStart::new("Error")))?;
    write_text_element(&mut writer, "Code", &detail.code)?;
    write_text_element(&mut writer, "Message", &detail.message)?;

    if let Some(details) = &detail.details {
        write(&mut writer, Event::Start(BytesStart::new("Details")))?;
        for (field, messages) in details.iter() {
            for message in messages {
                let start = BytesStart::new("Detail").with_attributes([("Field", field)]);
                write(&mut writer, Event::Start(start))?;
                write(&mut writer, Event::Text(BytesText::new(message)))?;
                write(&mut writer, Event::End(BytesEnd::new("Detail")))?;
            }
        }
        write(&mut writer, Event::End(BytesEnd::new("Details")))?;
    }
    if let Some(diagnostic) = &detail.diagnostic {
        write_text_element(&mut writer, "Diagnostic", diagnostic)?;
    }

    write(&mut writer, Event::End(BytesEnd::new("Error")))?;
    finish(writer)
}

fn is_nil(element: &BytesStart<'_>) -> bool {
    element
        .attributes()
        .flatten()
        .any(|attr| attr.key.local_name().as_ref() == b"nil" && attr.value.as_ref() == b"true")
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

fn expect_root(element: &BytesStart<'_>) -> Result<(), XmlError> {
    let name = local_name(element);
    if name == CUSTOMER_ELEMENT {
        Ok(())
    } else {
        Err(XmlError::UnexpectedRoot { expected: CUSTOMER_ELEMENT, found: name })
    }
}

fn is_blank(content: &[u8]) -> bool {
    content.iter().all(u8::is_ascii_whitespace)
}

/// Reads a `<Customer>` document in either flavor. Namespaces are ignored and
/// `nil` members decode as absent. Member text is kept verbatim. Unknown
/// members are skipped along with their whole subtree. Nothing but
/// whitespace, comments and processing instructions may follow the root.
pub fn decode_customer(body: &[u8]) -> Result<CustomerInput, XmlError> {
    let mut reader = Reader::from_reader(body);

    let mut input = CustomerInput::default();
    let mut root_seen = false;
    let mut root_closed = false;
    let mut member: Option<(String, bool)> = None;
    let mut text = String::new();

    loop {
        let event = reader.read_event().map_err(|error| XmlError::Read(error.to_string()))?;

        if root_closed {
            match event {
                Event::Eof => break,
                Event::Text(content) if is_blank(&content) => continue,
                Event::Comment(_) | Event::PI(_) => continue,
                _ => return Err(XmlError::TrailingContent),
            }
        }

        match event {
            Event::Start(element) if !root_seen => {
                expect_root(&element)?;
                root_seen = true;
            }
            Event::Empty(element) if !root_seen => {
                expect_root(&element)?;
                root_seen = true;
                root_closed = true;
            }
            Event::Text(content) if !root_seen => {
                if !is_blank(&content) {
                    return Err(XmlError::Read("text before the root element".to_string()));
                }
            }
            Event::Start(element) => {
                let name = local_name(&element);
                if let Some((parent, _)) = &member {
                    return Err(XmlError::Nested(parent.clone()));
                }
                if CUSTOMER_FIELDS.contains(&name.as_str()) {
                    member = Some((name, is_nil(&element)));
                    text.clear();
                } else {
                    reader
                        .read_to_end(element.name())
                        .map_err(|error| XmlError::Read(error.to_string()))?;
                }
            }
            Event::Empty(element) => {
                if let Some((parent, _)) = &member {
                    return Err(XmlError::Nested(parent.clone()));
                }
                let value = if is_nil(&element) { None } else { Some(String::new()) };
                input.set_wire_field(&local_name(&element), value);
            }
            Event::Text(content) => {
                if member.is_some() {
                    let unescaped =
                        content.unescape().map_err(|error| XmlError::Read(error.to_string()))?;
                    text.push_str(&unescaped);
                }
            }
            Event::CData(content) => {
                if member.is_some() {
                    text.push_str(&String::from_utf8_lossy(&content.into_inner()));
                }
            }
            Event::End(_) => match member.take() {
                Some((name, nil)) => {
                    let value = if nil { None } else { Some(std::mem::take(&mut text)) };
                    input.set_wire_field(&name, value);
                }
                None => root_closed = true,
            },
            Event::Eof => break,
            _ => {}
        }
    }

    match (root_seen, root_closed) {
        (false, _) => Err(XmlError::MissingRoot),
        (true, false) => Err(XmlError::Read("document ended inside the root element".to_string())),
        (true, true) => Ok(input),
    }
}

#[cfg(test)]
mod tests {
    use northwind_core::config::XmlFlavor;
    use northwind_core::domain::customer::{Customer, CustomerId, CustomerProfile};

    use super::*;

    fn alfreds() -> Customer {
        Customer {
            id: CustomerId("ALFKI".to_string()),
            profile: CustomerProfile {
                company_name: "Alfreds Futterkiste".to_string(),
                contact_name: Some("Maria Anders".to_string()),
                city: Some("Berlin".to_string()),
                country: Some("Germany".to_string()),
                ..CustomerProfile::default()
            },
        }
    }

    #[test]
    fn contract_xml_sorts_members_and_writes_nils() {
        let xml = encode_customer(&alfreds(), XmlFlavor::Contract).expect("encode");

        assert!(xml.starts_with("<Customer xmlns:i="), "{xml}");
        assert!(xml.contains(CONTRACT_NAMESPACE));
        assert!(xml.contains("<Region i:nil=\"true\"/>"), "{xml}");

        let city = xml.find("<City>").expect("city");
        let company = xml.find("<CompanyName>").expect("company");
        let customer_id = xml.find("<CustomerID>").expect("id");
        assert!(city < company && company < customer_id, "members should be alphabetical: {xml}");
    }

    #[test]
    fn reflection_xml_keeps_declaration_order_and_omits_absent_members() {
        let xml = encode_customer(&alfreds(), XmlFlavor::Reflection).expect("encode");

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"), "{xml}");
        assert!(xml.contains("xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\""));
        assert!(!xml.contains("Region"), "absent members are omitted: {xml}");

        let customer_id = xml.find("<CustomerID>").expect("id");
        let company = xml.find("<CompanyName>").expect("company");
        assert!(customer_id < company, "declaration order: {xml}");
    }

    #[test]
    fn collections_use_array_root_and_escape_text() {
        let mut second = alfreds();
        second.id = CustomerId("AROUT".to_string());
        second.profile.company_name = "Around & About <Ltd>".to_string();

        let xml = encode_customers(&[alfreds(), second], XmlFlavor::Contract).expect("encode");

        assert!(xml.starts_with("<ArrayOfCustomer "));
        assert!(xml.ends_with("</ArrayOfCustomer>"));
        assert_eq!(xml.matches("<Customer>").count(), 2);
        assert!(xml.contains("Around &amp; About &lt;Ltd&gt;"), "{xml}");
    }

    #[test]
    fn decode_reads_both_flavors_to_the_same_input() {
        for flavor in [XmlFlavor::Contract, XmlFlavor::Reflection] {
            let xml = encode_customer(&alfreds(), flavor).expect("encode");
            let input = decode_customer(xml.as_bytes()).expect("decode");

            assert_eq!(input.customer_id.as_deref(), Some("ALFKI"));
            assert_eq!(input.company_name.as_deref(), Some("Alfreds Futterkiste"));
            assert_eq!(input.city.as_deref(), Some("Berlin"));
            assert_eq!(input.region, None);
        }
    }

    #[test]
    fn decode_honors_nil_and_unescapes_text() {
        let xml = r#"<Customer xmlns:i="http://www.w3.org/2001/XMLSchema-instance">
            <CompanyName>Around &amp; About</CompanyName>
            <Fax i:nil="true"></Fax>
            <Orders>ignored</Orders>
        </Customer>"#;

        let input = decode_customer(xml.as_bytes()).expect("decode");

        assert_eq!(input.company_name.as_deref(), Some("Around & About"));
        assert_eq!(input.fax, None);
    }

    #[test]
    fn decode_keeps_member_whitespace_verbatim() {
        let mut customer = alfreds();
        customer.profile.address = Some("  12 Main St  ".to_string());
        customer.profile.contact_title = Some(" ".to_string());

        for flavor in [XmlFlavor::Contract, XmlFlavor::Reflection] {
            let xml = encode_customer(&customer, flavor).expect("encode");
            let input = decode_customer(xml.as_bytes()).expect("decode");

            assert_eq!(input.address.as_deref(), Some("  12 Main St  "), "{xml}");
            assert_eq!(input.contact_title.as_deref(), Some(" "), "{xml}");
            assert_eq!(input.company_name.as_deref(), Some("Alfreds Futterkiste"));
        }
    }

    #[test]
    fn decode_skips_unknown_members_with_children() {
        let xml = r#"<Customer>
            <CompanyName>Alfreds Futterkiste</CompanyName>
            <Orders>
                <Order><OrderID>10643</OrderID><CompanyName>not a member</CompanyName></Order>
            </Orders>
            <City>Berlin</City>
        </Customer>"#;

        let input = decode_customer(xml.as_bytes()).expect("decode");

        assert_eq!(input.company_name.as_deref(), Some("Alfreds Futterkiste"));
        assert_eq!(input.city.as_deref(), Some("Berlin"));
    }

    #[test]
    fn decode_rejects_content_after_the_root() {
        let xml = "<Customer><CompanyName>Good</CompanyName></Customer>\
                   <CompanyName>Injected</CompanyName>";
        assert!(matches!(decode_customer(xml.as_bytes()), Err(XmlError::TrailingContent)));

        let trailing_whitespace = "<Customer><CompanyName>Good</CompanyName></Customer>\n  <!-- end -->\n";
        let input = decode_customer(trailing_whitespace.as_bytes()).expect("decode");
        assert_eq!(input.company_name.as_deref(), Some("Good"));
    }

    #[test]
    fn decode_rejects_children_inside_known_members() {
        assert!(matches!(
            decode_customer(b"<Customer><City><Name>Berlin</Name></City></Customer>"),
            Err(XmlError::Nested(name)) if name == "City"
        ));
    }

    #[test]
    fn decode_rejects_foreign_roots_and_garbage() {
        assert!(matches!(
            decode_customer(b"<Order><OrderID>1</OrderID></Order>"),
            Err(XmlError::UnexpectedRoot { .. })
        ));
        assert!(matches!(decode_customer(b""), Err(XmlError::MissingRoot)));
        assert!(decode_customer(b"<Customer><CompanyName>x</Customer>").is_err());
    }
}
