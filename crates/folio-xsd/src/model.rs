//! Compiled schema model.
//!
//! [`compile`] walks an `xs:schema` element tree and produces a
//! [`SchemaModel`]. Named types and element references are kept as names and
//! resolved during validation, so declarations may appear in any order and
//! types may be recursive. [`SchemaModel::unresolved`] reports dangling
//! names up front.

use std::collections::HashMap;

use regex::Regex;

use crate::{
  dom::{Element, NS_XSD},
  error::{Error, Result},
  simple::{Builtin, Facets},
};

// ─── Model ───────────────────────────────────────────────────────────────────

/// A reference to a simple type.
#[derive(Debug, Clone)]
pub enum SimpleRef {
  Builtin(Builtin),
  Named(String),
  Inline(Box<SimpleType>),
}

#[derive(Debug, Clone)]
pub enum Variety {
  Atomic(SimpleRef),
  List(SimpleRef),
  /// Members are not checked; any string is accepted.
  Union,
}

#[derive(Debug, Clone)]
pub struct SimpleType {
  pub variety: Variety,
  pub facets:  Facets,
}

/// The type of an element declaration.
#[derive(Debug, Clone)]
pub enum ElementType {
  /// `xs:anyType`, or no type at all: anything goes.
  Any,
  Simple(SimpleRef),
  /// A named type that may be simple or complex.
  Named(String),
  Complex(Box<ComplexType>),
}

#[derive(Debug, Clone)]
pub struct ElementDecl {
  pub name:     String,
  pub ty:       ElementType,
  pub fixed:    Option<String>,
  pub nillable: bool,
}

#[derive(Debug, Clone)]
pub struct AttributeDecl {
  pub name:       String,
  pub ty:         SimpleRef,
  pub required:   bool,
  pub prohibited: bool,
  pub fixed:      Option<String>,
}

#[derive(Debug, Clone)]
pub enum Term {
  Element(ElementDecl),
  /// `ref` to a global element declaration.
  Ref(String),
  Sequence(Vec<Particle>),
  Choice(Vec<Particle>),
  All(Vec<Particle>),
  /// `xs:any`, always processed laxly.
  Any,
}

#[derive(Debug, Clone)]
pub struct Particle {
  pub min:  u32,
  /// `None` is `unbounded`.
  pub max:  Option<u32>,
  pub term: Term,
}

#[derive(Debug, Clone)]
pub enum ContentModel {
  Empty,
  Particle(Particle),
  Simple(SimpleRef),
}

#[derive(Debug, Clone)]
pub struct ComplexType {
  pub mixed:         bool,
  /// Named complex type extended via `xs:complexContent`.
  pub base:          Option<String>,
  pub content:       ContentModel,
  pub attributes:    Vec<AttributeDecl>,
  pub any_attribute: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaModel {
  pub target_namespace: Option<String>,
  pub elements:         HashMap<String, ElementDecl>,
  pub complex_types:    HashMap<String, ComplexType>,
  pub simple_types:     HashMap<String, SimpleType>,
}

// ─── Compilation ─────────────────────────────────────────────────────────────

fn xsd_children(el: &Element) -> impl Iterator<Item = Result<&Element>> {
  el.elements()
    .filter(|c| !c.is(NS_XSD, "annotation"))
    .map(|c| {
      if c.namespace.as_deref() == Some(NS_XSD) {
        Ok(c)
      } else {
        Err(Error::InvalidSchema(format!(
          "unexpected element <{}> inside xs:{}",
          c.local, el.local
        )))
      }
    })
}

fn required_attr<'e>(el: &'e Element, name: &str) -> Result<&'e str> {
  el.attr(name).ok_or_else(|| {
    Error::InvalidSchema(format!("xs:{} is missing the {name:?} attribute", el.local))
  })
}

fn parse_occurs(el: &Element) -> Result<(u32, Option<u32>)> {
  let bad = |attr: &str, v: &str| {
    Error::InvalidSchema(format!("invalid {attr} value {v:?} on xs:{}", el.local))
  };
  let min = match el.attr("minOccurs") {
    Some(v) => v.trim().parse::<u32>().map_err(|_| bad("minOccurs", v))?,
    None => 1,
  };
  let max = match el.attr("maxOccurs").map(str::trim) {
    Some("unbounded") => None,
    Some(v) => Some(v.parse::<u32>().map_err(|_| bad("maxOccurs", v))?),
    None => Some(1),
  };
  if max.is_some_and(|m| m < min) {
    return Err(Error::InvalidSchema(format!(
      "maxOccurs is smaller than minOccurs on xs:{}",
      el.local
    )));
  }
  Ok((min, max))
}

/// Resolve a QName-valued type attribute to a simple type reference.
fn simple_ref(el: &Element, qname: &str) -> Result<SimpleRef> {
  let (namespace, local) = el.resolve_qname(qname)?;
  if namespace.as_deref() == Some(NS_XSD) {
    Builtin::from_name(&local)
      .map(SimpleRef::Builtin)
      .ok_or_else(|| Error::InvalidSchema(format!("unknown built-in simple type xs:{local}")))
  } else {
    Ok(SimpleRef::Named(local))
  }
}

fn element_type(el: &Element, qname: &str) -> Result<ElementType> {
  let (namespace, local) = el.resolve_qname(qname)?;
  if namespace.as_deref() != Some(NS_XSD) {
    return Ok(ElementType::Named(local));
  }
  if local == "anyType" {
    return Ok(ElementType::Any);
  }
  Builtin::from_name(&local)
    .map(|b| ElementType::Simple(SimpleRef::Builtin(b)))
    .ok_or_else(|| Error::InvalidSchema(format!("unknown built-in type xs:{local}")))
}

fn compile_element(el: &Element) -> Result<ElementDecl> {
  let name = required_attr(el, "name")?.to_owned();

  let mut ty = match el.attr("type") {
    Some(qname) => Some(element_type(el, qname)?),
    None => None,
  };

  for child in xsd_children(el) {
    let child = child?;
    let inline = match child.local.as_str() {
      "complexType" => ElementType::Complex(Box::new(compile_complex(child)?)),
      "simpleType" => ElementType::Simple(SimpleRef::Inline(Box::new(compile_simple(child)?))),
      other => return Err(Error::Unsupported(other.to_owned())),
    };
    if ty.replace(inline).is_some() {
      return Err(Error::InvalidSchema(format!(
        "element {name:?} declares its type more than once"
      )));
    }
  }

  Ok(ElementDecl {
    name,
    ty: ty.unwrap_or(ElementType::Any),
    fixed: el.attr("fixed").map(str::to_owned),
    nillable: el.attr("nillable").is_some_and(|v| matches!(v.trim(), "true" | "1")),
  })
}

fn compile_particle(el: &Element) -> Result<Particle> {
  let (min, max) = parse_occurs(el)?;
  let term = match el.local.as_str() {
    "element" => match el.attr("ref") {
      Some(qname) => Term::Ref(el.resolve_qname(qname)?.1),
      None => Term::Element(compile_element(el)?),
    },
    "sequence" => Term::Sequence(compile_group_members(el)?),
    "choice" => Term::Choice(compile_group_members(el)?),
    "all" => {
      let members = compile_group_members(el)?;
      let valid = members.iter().all(|p| {
        matches!(p.term, Term::Element(_) | Term::Ref(_)) && p.max.is_some_and(|m| m <= 1)
      });
      if !valid || max.is_none_or(|m| m > 1) {
        return Err(Error::InvalidSchema(
          "xs:all may only contain elements occurring at most once".into(),
        ));
      }
      Term::All(members)
    }
    "any" => Term::Any,
    other => return Err(Error::Unsupported(other.to_owned())),
  };
  Ok(Particle { min, max, term })
}

fn compile_group_members(el: &Element) -> Result<Vec<Particle>> {
  xsd_children(el).map(|c| compile_particle(c?)).collect()
}

fn compile_attribute(el: &Element) -> Result<AttributeDecl> {
  if el.attr("ref").is_some() {
    return Err(Error::Unsupported("attribute ref".into()));
  }
  let name = required_attr(el, "name")?.to_owned();

  let mut ty = match el.attr("type") {
    Some(qname) => Some(simple_ref(el, qname)?),
    None => None,
  };
  for child in xsd_children(el) {
    let child = child?;
    if child.local != "simpleType" || ty.is_some() {
      return Err(Error::InvalidSchema(format!(
        "attribute {name:?} has an invalid type declaration"
      )));
    }
    ty = Some(SimpleRef::Inline(Box::new(compile_simple(child)?)));
  }

  let usage = el.attr("use").map(str::trim).unwrap_or("optional");
  if !matches!(usage, "optional" | "required" | "prohibited") {
    return Err(Error::InvalidSchema(format!("invalid use {usage:?} on attribute {name:?}")));
  }

  Ok(AttributeDecl {
    name,
    ty: ty.unwrap_or(SimpleRef::Builtin(Builtin::AnySimpleType)),
    required: usage == "required",
    prohibited: usage == "prohibited",
    fixed: el.attr("fixed").map(str::to_owned),
  })
}

/// Collect attribute declarations from the children of `el`, skipping
/// anything `other` accepts.
fn compile_attributes<F>(
  el: &Element,
  target: &mut ComplexType,
  mut other: F,
) -> Result<()>
where
  F: FnMut(&Element, &mut ComplexType) -> Result<bool>,
{
  for child in xsd_children(el) {
    let child = child?;
    match child.local.as_str() {
      "attribute" => target.attributes.push(compile_attribute(child)?),
      "anyAttribute" => target.any_attribute = true,
      _ => {
        if !other(child, target)? {
          return Err(Error::Unsupported(child.local.clone()));
        }
      }
    }
  }
  Ok(())
}

fn is_flag(el: &Element, name: &str) -> bool {
  el.attr(name).is_some_and(|v| matches!(v.trim(), "true" | "1"))
}

fn compile_complex(el: &Element) -> Result<ComplexType> {
  let mut ct = ComplexType {
    mixed:         is_flag(el, "mixed"),
    base:          None,
    content:       ContentModel::Empty,
    attributes:    Vec::new(),
    any_attribute: false,
  };

  compile_attributes(el, &mut ct, |child, ct| {
    match child.local.as_str() {
      "sequence" | "choice" | "all" => set_particle(ct, compile_particle(child)?)?,
      "simpleContent" => compile_simple_content(child, ct)?,
      "complexContent" => compile_complex_content(child, ct)?,
      _ => return Ok(false),
    }
    Ok(true)
  })?;

  Ok(ct)
}

fn set_particle(ct: &mut ComplexType, particle: Particle) -> Result<()> {
  if !matches!(ct.content, ContentModel::Empty) {
    return Err(Error::InvalidSchema("complex type has more than one content model".into()));
  }
  ct.content = ContentModel::Particle(particle);
  Ok(())
}

fn derivation(el: &Element) -> Result<&Element> {
  let mut children = xsd_children(el);
  match (children.next(), children.next()) {
    (Some(d), None) => {
      let d = d?;
      if matches!(d.local.as_str(), "extension" | "restriction") {
        Ok(d)
      } else {
        Err(Error::Unsupported(d.local.clone()))
      }
    }
    _ => Err(Error::InvalidSchema(format!(
      "xs:{} needs exactly one xs:extension or xs:restriction",
      el.local
    ))),
  }
}

fn compile_simple_content(el: &Element, ct: &mut ComplexType) -> Result<()> {
  let d = derivation(el)?;
  let base = simple_ref(d, required_attr(d, "base")?)?;
  ct.content = ContentModel::Simple(base);
  compile_attributes(d, ct, |child, _| {
    // Facets on a simpleContent restriction are not enforced.
    Ok(d.local == "restriction" && !matches!(child.local.as_str(), "simpleType"))
  })
}

fn compile_complex_content(el: &Element, ct: &mut ComplexType) -> Result<()> {
  if is_flag(el, "mixed") {
    ct.mixed = true;
  }
  let d = derivation(el)?;
  if d.local == "extension" {
    let (namespace, local) = d.resolve_qname(required_attr(d, "base")?)?;
    if namespace.as_deref() != Some(NS_XSD) {
      ct.base = Some(local);
    } else if local != "anyType" {
      return Err(Error::InvalidSchema(format!(
        "complexContent cannot extend simple type xs:{local}"
      )));
    }
  }
  // A restriction restates the full content model, so the base is dropped.
  compile_attributes(d, ct, |child, ct| {
    match child.local.as_str() {
      "sequence" | "choice" | "all" => set_particle(ct, compile_particle(child)?)?,
      _ => return Ok(false),
    }
    Ok(true)
  })
}

fn compile_simple(el: &Element) -> Result<SimpleType> {
  let mut children = xsd_children(el);
  let body = match (children.next(), children.next()) {
    (Some(d), None) => d?,
    _ => {
      return Err(Error::InvalidSchema(
        "xs:simpleType needs exactly one restriction, list, or union".into(),
      ));
    }
  };

  match body.local.as_str() {
    "restriction" => {
      let mut base = match body.attr("base") {
        Some(qname) => Some(simple_ref(body, qname)?),
        None => None,
      };
      let mut facets = Facets::default();
      for facet in xsd_children(body) {
        let facet = facet?;
        if facet.local == "simpleType" {
          if base.replace(SimpleRef::Inline(Box::new(compile_simple(facet)?))).is_some() {
            return Err(Error::InvalidSchema("restriction declares its base twice".into()));
          }
          continue;
        }
        apply_facet(facet, &mut facets)?;
      }
      let base = base.ok_or_else(|| Error::InvalidSchema("restriction has no base type".into()))?;
      Ok(SimpleType { variety: Variety::Atomic(base), facets })
    }
    "list" => {
      let item = match body.attr("itemType") {
        Some(qname) => simple_ref(body, qname)?,
        None => {
          let inline = xsd_children(body)
            .next()
            .ok_or_else(|| Error::InvalidSchema("xs:list has no item type".into()))??;
          SimpleRef::Inline(Box::new(compile_simple(inline)?))
        }
      };
      Ok(SimpleType { variety: Variety::List(item), facets: Facets::default() })
    }
    "union" => Ok(SimpleType { variety: Variety::Union, facets: Facets::default() }),
    other => Err(Error::Unsupported(other.to_owned())),
  }
}

fn apply_facet(facet: &Element, facets: &mut Facets) -> Result<()> {
  let value = required_attr(facet, "value")?;
  let size = || {
    value.trim().parse::<usize>().map_err(|_| {
      Error::InvalidSchema(format!("invalid xs:{} value {value:?}", facet.local))
    })
  };
  match facet.local.as_str() {
    "enumeration" => facets.enumeration.push(value.to_owned()),
    "pattern" => {
      let regex = Regex::new(&format!("^(?:{value})$")).map_err(|source| Error::Pattern {
        pattern: value.to_owned(),
        source,
      })?;
      facets.patterns.push(regex);
    }
    "length" => facets.length = Some(size()?),
    "minLength" => facets.min_length = Some(size()?),
    "maxLength" => facets.max_length = Some(size()?),
    "minInclusive" => facets.min_inclusive = Some(value.trim().to_owned()),
    "maxInclusive" => facets.max_inclusive = Some(value.trim().to_owned()),
    "minExclusive" => facets.min_exclusive = Some(value.trim().to_owned()),
    "maxExclusive" => facets.max_exclusive = Some(value.trim().to_owned()),
    // Accepted but not enforced.
    "whiteSpace" | "totalDigits" | "fractionDigits" => {}
    other => return Err(Error::Unsupported(other.to_owned())),
  }
  Ok(())
}

/// Compile a parsed `xs:schema` document.
pub fn compile(root: &Element) -> Result<SchemaModel> {
  if !root.is(NS_XSD, "schema") {
    return Err(Error::NotASchema(root.local.clone()));
  }

  let mut model = SchemaModel {
    target_namespace: root.attr("targetNamespace").map(str::to_owned),
    ..SchemaModel::default()
  };

  for child in xsd_children(root) {
    let child = child?;
    let name = || required_attr(child, "name").map(str::to_owned);
    let duplicate = |kind: &str, name: &str| {
      Error::InvalidSchema(format!("{kind} {name:?} is declared more than once"))
    };
    match child.local.as_str() {
      "element" => {
        let decl = compile_element(child)?;
        if model.elements.contains_key(&decl.name) {
          return Err(duplicate("element", &decl.name));
        }
        model.elements.insert(decl.name.clone(), decl);
      }
      "complexType" => {
        let name = name()?;
        if model.complex_types.contains_key(&name) || model.simple_types.contains_key(&name) {
          return Err(duplicate("type", &name));
        }
        model.complex_types.insert(name, compile_complex(child)?);
      }
      "simpleType" => {
        let name = name()?;
        if model.complex_types.contains_key(&name) || model.simple_types.contains_key(&name) {
          return Err(duplicate("type", &name));
        }
        model.simple_types.insert(name, compile_simple(child)?);
      }
      other => return Err(Error::Unsupported(other.to_owned())),
    }
  }

  Ok(model)
}

// ─── Reference checks ────────────────────────────────────────────────────────

impl SchemaModel {
  /// Names referenced somewhere in the model that have no declaration,
  /// formatted for diagnostics and sorted.
  pub fn unresolved(&self) -> Vec<String> {
    let mut missing = Vec::new();
    for decl in self.elements.values() {
      self.check_element(decl, &mut missing);
    }
    for ct in self.complex_types.values() {
      self.check_complex(ct, &mut missing);
    }
    for st in self.simple_types.values() {
      self.check_simple(st, &mut missing);
    }
    missing.sort();
    missing.dedup();
    missing
  }

  fn check_element(&self, decl: &ElementDecl, missing: &mut Vec<String>) {
    match &decl.ty {
      ElementType::Any => {}
      ElementType::Simple(r) => self.check_simple_ref(r, missing),
      ElementType::Named(name) => {
        if !self.complex_types.contains_key(name) && !self.simple_types.contains_key(name) {
          missing.push(format!("type {name:?}"));
        }
      }
      ElementType::Complex(ct) => self.check_complex(ct, missing),
    }
  }

  fn check_complex(&self, ct: &ComplexType, missing: &mut Vec<String>) {
    if let Some(base) = &ct.base
      && !self.complex_types.contains_key(base)
    {
      missing.push(format!("complex type {base:?}"));
    }
    match &ct.content {
      ContentModel::Empty => {}
      ContentModel::Particle(p) => self.check_particle(p, missing),
      ContentModel::Simple(r) => self.check_simple_ref(r, missing),
    }
    for attr in &ct.attributes {
      self.check_simple_ref(&attr.ty, missing);
    }
  }

  fn check_particle(&self, particle: &Particle, missing: &mut Vec<String>) {
    match &particle.term {
      Term::Element(decl) => self.check_element(decl, missing),
      Term::Ref(name) => {
        if !self.elements.contains_key(name) {
          missing.push(format!("element {name:?}"));
        }
      }
      Term::Sequence(ps) | Term::Choice(ps) | Term::All(ps) => {
        for p in ps {
          self.check_particle(p, missing);
        }
      }
      Term::Any => {}
    }
  }

  fn check_simple(&self, st: &SimpleType, missing: &mut Vec<String>) {
    match &st.variety {
      Variety::Atomic(r) | Variety::List(r) => self.check_simple_ref(r, missing),
      Variety::Union => {}
    }
  }

  fn check_simple_ref(&self, r: &SimpleRef, missing: &mut Vec<String>) {
    match r {
      SimpleRef::Builtin(_) => {}
      SimpleRef::Named(name) => {
        if !self.simple_types.contains_key(name) {
          missing.push(format!("simple type {name:?}"));
        }
      }
      SimpleRef::Inline(st) => self.check_simple(st, missing),
    }
  }
}
