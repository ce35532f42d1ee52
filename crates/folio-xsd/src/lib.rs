//! XML Schema validation engine for Folio.
//!
//! Checks content documents against XSD schema documents. Pure synchronous;
//! no I/O, no caching. Implements [`folio_core::validate::ContentValidator`]
//! through [`XsdValidator`].
//!
//! # Quick start
//!
//! ```no_run
//! use folio_core::validate::ContentValidator;
//! use folio_xsd::XsdValidator;
//!
//! let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
//!   <xs:element name="note" type="xs:string"/>
//! </xs:schema>"#;
//! assert!(XsdValidator.validate_content("<note>hi</note>", schema));
//! ```
//!
//! The supported subset covers element, attribute, and type declarations,
//! sequence/choice/all groups with occurrence bounds, wildcards, extension,
//! and simple-type restrictions with the common facets. Constructs outside
//! the subset (imports, includes, named groups, identity constraints) make
//! the schema unusable rather than being ignored.

mod dom;
pub mod error;
mod model;
mod simple;
mod validate;

pub use error::{Error, Result};
use folio_core::validate::{ContentValidator, Violation};

// ─── Compiled schema ─────────────────────────────────────────────────────────

/// A schema document compiled once and usable for many documents.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
  model: model::SchemaModel,
}

impl CompiledSchema {
  /// Parse and compile `schema_xml`, failing on the first problem.
  pub fn compile(schema_xml: &str) -> Result<Self> {
    let root = dom::parse(schema_xml)?;
    let model = model::compile(&root)?;
    if let Some(first) = model.unresolved().into_iter().next() {
      return Err(Error::InvalidSchema(format!("{first} is not declared")));
    }
    Ok(Self { model })
  }

  /// The schema's `targetNamespace`, if any.
  pub fn target_namespace(&self) -> Option<&str> { self.model.target_namespace.as_deref() }

  /// Every violation of this schema in `content_xml`. Empty means valid.
  pub fn validate(&self, content_xml: &str) -> Vec<Violation> {
    match dom::parse(content_xml) {
      Ok(root) => validate::Validation::new(&self.model).document(&root),
      Err(e) => vec![Violation::new("", e.to_string())],
    }
  }
}

// ─── ContentValidator ────────────────────────────────────────────────────────

/// Stateless [`ContentValidator`] backed by this crate's XSD engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct XsdValidator;

impl ContentValidator for XsdValidator {
  fn violations(&self, content_xml: &str, schema_xml: &str) -> Vec<Violation> {
    match CompiledSchema::compile(schema_xml) {
      Ok(schema) => schema.validate(content_xml),
      Err(e) => vec![Violation::new("", format!("schema: {e}"))],
    }
  }

  fn schema_violations(&self, schema_xml: &str) -> Vec<Violation> {
    let compiled = dom::parse(schema_xml).and_then(|root| model::compile(&root));
    match compiled {
      Ok(model) => model
        .unresolved()
        .into_iter()
        .map(|name| Violation::new("", format!("{name} is not declared")))
        .collect(),
      Err(e) => vec![Violation::new("", e.to_string())],
    }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  const INVOICE_XSD: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="invoice">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="customer" type="xs:string"/>
        <xs:element name="issued" type="xs:date"/>
        <xs:element name="line" type="Line" maxOccurs="unbounded"/>
        <xs:element name="note" type="xs:string" minOccurs="0"/>
      </xs:sequence>
      <xs:attribute name="number" type="InvoiceNumber" use="required"/>
      <xs:attribute name="currency" type="Currency"/>
    </xs:complexType>
  </xs:element>

  <xs:complexType name="Line">
    <xs:sequence>
      <xs:element name="description" type="xs:string"/>
      <xs:element name="amount" type="Amount"/>
    </xs:sequence>
    <xs:attribute name="qty" type="xs:positiveInteger" use="required"/>
  </xs:complexType>

  <xs:simpleType name="InvoiceNumber">
    <xs:restriction base="xs:string">
      <xs:pattern value="INV-[0-9]{4}"/>
    </xs:restriction>
  </xs:simpleType>

  <xs:simpleType name="Currency">
    <xs:restriction base="xs:token">
      <xs:enumeration value="EUR"/>
      <xs:enumeration value="USD"/>
    </xs:restriction>
  </xs:simpleType>

  <xs:simpleType name="Amount">
    <xs:restriction base="xs:decimal">
      <xs:minInclusive value="0"/>
    </xs:restriction>
  </xs:simpleType>
</xs:schema>"#;

  fn invoice(lines: &str) -> String {
    format!(
      r#"<invoice number="INV-0042" currency="EUR">
  <customer>Acme</customer>
  <issued>2024-03-01</issued>
  {lines}
</invoice>"#
    )
  }

  const LINE: &str = r#"<line qty="2"><description>Widget</description><amount>9.50</amount></line>"#;

  fn violations(content: &str, schema: &str) -> Vec<Violation> {
    XsdValidator.violations(content, schema)
  }

  #[test]
  fn valid_invoice_passes() {
    let doc = invoice(&format!("{LINE}{LINE}"));
    assert_eq!(violations(&doc, INVOICE_XSD), vec![]);
    assert!(XsdValidator.validate_content(&doc, INVOICE_XSD));
  }

  #[test]
  fn empty_schema_accepts_any_well_formed_document() {
    let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"/>"#;
    assert!(XsdValidator.validate_content("<invoice/>", schema));
    assert!(!XsdValidator.validate_content("<invoice>", schema));
  }

  #[test]
  fn unknown_root_is_rejected() {
    let v = violations("<receipt/>", INVOICE_XSD);
    assert_eq!(v.len(), 1);
    assert_eq!(v[0].path, "/receipt");
  }

  #[test]
  fn missing_required_element_is_rejected() {
    let doc = r#"<invoice number="INV-0001"><customer>Acme</customer><issued>2024-03-01</issued></invoice>"#;
    let v = violations(doc, INVOICE_XSD);
    assert_eq!(v.len(), 1);
    assert!(v[0].message.contains("does not match"), "{:?}", v);
  }

  #[test]
  fn out_of_order_elements_are_rejected() {
    let doc = format!(
      r#"<invoice number="INV-0001"><issued>2024-03-01</issued><customer>Acme</customer>{LINE}</invoice>"#
    );
    assert!(!XsdValidator.validate_content(&doc, INVOICE_XSD));
  }

  #[test]
  fn attribute_rules_are_enforced() {
    let missing = invoice(LINE).replace(r#"number="INV-0042" "#, "");
    let v = violations(&missing, INVOICE_XSD);
    assert!(v.iter().any(|v| v.message.contains("missing required attribute")));

    let bad_pattern = invoice(LINE).replace("INV-0042", "INV-42");
    let v = violations(&bad_pattern, INVOICE_XSD);
    assert_eq!(v[0].path, "/invoice/@number");

    let bad_enum = invoice(LINE).replace("EUR", "GBP");
    assert!(!XsdValidator.validate_content(&bad_enum, INVOICE_XSD));

    let undeclared = invoice(LINE).replace("<invoice ", r#"<invoice draft="yes" "#);
    let v = violations(&undeclared, INVOICE_XSD);
    assert!(v[0].message.contains("not declared"));
  }

  #[test]
  fn nested_values_report_indexed_paths() {
    let bad = r#"<line qty="1"><description>Bolt</description><amount>-1</amount></line>"#;
    let doc = invoice(&format!("{LINE}{bad}"));
    let v = violations(&doc, INVOICE_XSD);
    assert_eq!(v.len(), 1);
    assert_eq!(v[0].path, "/invoice/line[2]/amount");
  }

  #[test]
  fn simple_elements_reject_children_and_bad_values() {
    let doc = invoice(LINE).replace("2024-03-01", "March 1st");
    let v = violations(&doc, INVOICE_XSD);
    assert_eq!(v[0].path, "/invoice/issued");

    let doc = invoice(LINE).replace("<customer>Acme</customer>", "<customer><b>Acme</b></customer>");
    assert!(!XsdValidator.validate_content(&doc, INVOICE_XSD));
  }

  #[test]
  fn text_in_element_only_content_is_rejected() {
    let doc = invoice(LINE).replace("<customer>", "stray text<customer>");
    let v = violations(&doc, INVOICE_XSD);
    assert!(v.iter().any(|v| v.message.contains("character data")));
  }

  #[test]
  fn malformed_content_is_a_violation() {
    let v = violations("<invoice><customer></invoice>", INVOICE_XSD);
    assert_eq!(v.len(), 1);
    assert!(v[0].path.is_empty());
  }

  #[test]
  fn unusable_schema_fails_every_document() {
    assert!(!XsdValidator.validate_content("<a/>", "not xml at all"));
    assert!(!XsdValidator.validate_content("<a/>", "<schema/>"));
    let dangling = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
      <xs:element name="a" type="Nope"/>
    </xs:schema>"#;
    assert!(!XsdValidator.validate_content("<a/>", dangling));
    assert_eq!(XsdValidator.schema_violations(dangling).len(), 1);
    assert!(XsdValidator.schema_violations(INVOICE_XSD).is_empty());
  }

  #[test]
  fn target_namespace_must_match_root() {
    let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                                targetNamespace="urn:folio:memo">
      <xs:element name="memo" type="xs:string"/>
    </xs:schema>"#;
    assert_eq!(
      CompiledSchema::compile(schema).unwrap().target_namespace(),
      Some("urn:folio:memo")
    );
    assert!(XsdValidator.validate_content(r#"<memo xmlns="urn:folio:memo">hi</memo>"#, schema));
    assert!(!XsdValidator.validate_content("<memo>hi</memo>", schema));
  }

  #[test]
  fn choice_and_repetition() {
    let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
      <xs:element name="feed">
        <xs:complexType>
          <xs:choice minOccurs="0" maxOccurs="unbounded">
            <xs:element name="post" type="xs:string"/>
            <xs:element name="link" type="xs:anyURI"/>
          </xs:choice>
        </xs:complexType>
      </xs:element>
    </xs:schema>"#;
    assert!(XsdValidator.validate_content("<feed/>", schema));
    assert!(XsdValidator.validate_content(
      "<feed><post>a</post><link>http://x</link><post>b</post></feed>",
      schema
    ));
    assert!(!XsdValidator.validate_content("<feed><image/></feed>", schema));
  }

  #[test]
  fn all_group_accepts_any_order() {
    let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
      <xs:element name="person">
        <xs:complexType>
          <xs:all>
            <xs:element name="given" type="xs:string"/>
            <xs:element name="family" type="xs:string"/>
            <xs:element name="nick" type="xs:string" minOccurs="0"/>
          </xs:all>
        </xs:complexType>
      </xs:element>
    </xs:schema>"#;
    assert!(XsdValidator.validate_content(
      "<person><family>Doe</family><given>Jo</given></person>",
      schema
    ));
    assert!(!XsdValidator.validate_content("<person><given>Jo</given></person>", schema));
    assert!(!XsdValidator.validate_content(
      "<person><given>Jo</given><given>Al</given><family>Doe</family></person>",
      schema
    ));
  }

  #[test]
  fn extension_and_simple_content() {
    let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
      <xs:complexType name="Base">
        <xs:sequence><xs:element name="id" type="xs:int"/></xs:sequence>
        <xs:attribute name="rev" type="xs:int"/>
      </xs:complexType>
      <xs:complexType name="Article">
        <xs:complexContent>
          <xs:extension base="Base">
            <xs:sequence><xs:element name="title" type="Title"/></xs:sequence>
          </xs:extension>
        </xs:complexContent>
      </xs:complexType>
      <xs:complexType name="Title">
        <xs:simpleContent>
          <xs:extension base="xs:string">
            <xs:attribute name="lang" type="xs:language"/>
          </xs:extension>
        </xs:simpleContent>
      </xs:complexType>
      <xs:element name="article" type="Article"/>
    </xs:schema>"#;
    assert!(XsdValidator.validate_content(
      r#"<article rev="3"><id>7</id><title lang="en">Hello</title></article>"#,
      schema
    ));
    assert!(!XsdValidator.validate_content(
      r#"<article><title>Hello</title></article>"#,
      schema
    ));
    assert!(!XsdValidator.validate_content(
      r#"<article><id>7</id><title lang="not a language">Hello</title></article>"#,
      schema
    ));
  }

  #[test]
  fn wildcards_mixed_content_and_lists() {
    let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
      <xs:simpleType name="Tags">
        <xs:list itemType="xs:NCName"/>
      </xs:simpleType>
      <xs:element name="page">
        <xs:complexType mixed="true">
          <xs:sequence>
            <xs:element name="tags" type="Tags"/>
            <xs:any minOccurs="0" maxOccurs="unbounded"/>
          </xs:sequence>
          <xs:anyAttribute/>
        </xs:complexType>
      </xs:element>
    </xs:schema>"#;
    assert!(XsdValidator.validate_content(
      r#"<page data-x="1">Intro <tags>news tech</tags> and <em>anything</em> else</page>"#,
      schema
    ));
    assert!(!XsdValidator.validate_content("<page><tags>ok 9bad</tags></page>", schema));
  }

  #[test]
  fn wildcard_children_with_global_declarations_are_checked() {
    let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
      <xs:element name="count" type="xs:int"/>
      <xs:element name="bag">
        <xs:complexType>
          <xs:sequence>
            <xs:any minOccurs="0" maxOccurs="unbounded"/>
          </xs:sequence>
        </xs:complexType>
      </xs:element>
    </xs:schema>"#;
    assert!(XsdValidator.validate_content("<bag><count>3</count><other>x</other></bag>", schema));
    let v = violations("<bag><count>three</count></bag>", schema);
    assert_eq!(v.len(), 1);
    assert_eq!(v[0].path, "/bag/count");
  }

  #[test]
  fn patterns_in_one_restriction_are_alternatives() {
    let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
      <xs:simpleType name="Code">
        <xs:restriction base="xs:string">
          <xs:pattern value="[0-9]+"/>
          <xs:pattern value="[a-z]+"/>
        </xs:restriction>
      </xs:simpleType>
      <xs:simpleType name="ShortCode">
        <xs:restriction base="Code">
          <xs:pattern value=".{1,3}"/>
        </xs:restriction>
      </xs:simpleType>
      <xs:element name="code" type="Code"/>
      <xs:element name="short" type="ShortCode"/>
    </xs:schema>"#;
    assert_eq!(violations("<code>abc</code>", schema), vec![]);
    assert_eq!(violations("<code>123</code>", schema), vec![]);
    assert_eq!(violations("<code>abc123</code>", schema).len(), 1);
    // Patterns from different derivation steps must all match.
    assert_eq!(violations("<short>ab</short>", schema), vec![]);
    assert_eq!(violations("<short>abcd</short>", schema).len(), 1);
  }

  #[test]
  fn deeply_nested_documents_are_rejected() {
    let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"/>"#;
    let deep = "<a>".repeat(200_000) + &"</a>".repeat(200_000);
    assert!(!XsdValidator.validate_content(&deep, schema));
    let v = violations(&deep, schema);
    assert_eq!(v.len(), 1);
    assert_eq!(v[0].path, "");
  }

  #[test]
  fn nil_and_fixed_values() {
    let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
      <xs:element name="doc">
        <xs:complexType>
          <xs:sequence>
            <xs:element name="kind" type="xs:string" fixed="report"/>
            <xs:element name="due" type="xs:date" nillable="true"/>
          </xs:sequence>
        </xs:complexType>
      </xs:element>
    </xs:schema>"#;
    let xsi = r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#;
    assert!(XsdValidator.validate_content(
      &format!(r#"<doc {xsi}><kind>report</kind><due xsi:nil="true"/></doc>"#),
      schema
    ));
    assert!(!XsdValidator.validate_content(
      &format!(r#"<doc {xsi}><kind>memo</kind><due xsi:nil="true"/></doc>"#),
      schema
    ));
    assert!(!XsdValidator.validate_content(
      &format!(r#"<doc {xsi}><kind xsi:nil="true"/><due>2024-01-01</due></doc>"#),
      schema
    ));
  }

  #[test]
  fn recursive_types_validate() {
    let schema = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
      <xs:complexType name="Node">
        <xs:sequence>
          <xs:element name="node" type="Node" minOccurs="0" maxOccurs="unbounded"/>
        </xs:sequence>
        <xs:attribute name="label" type="xs:string" use="required"/>
      </xs:complexType>
      <xs:element name="node" type="Node"/>
    </xs:schema>"#;
    assert!(XsdValidator.validate_content(
      r#"<node label="a"><node label="b"><node label="c"/></node><node label="d"/></node>"#,
      schema
    ));
    let v = violations(r#"<node label="a"><node label="b"><node/></node></node>"#, schema);
    assert_eq!(v.len(), 1);
    assert_eq!(v[0].path, "/node/node/node");
  }
}
