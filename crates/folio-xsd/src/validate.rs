//! Instance validation against a compiled [`SchemaModel`].
//!
//! Content models are matched by tracking every position the children could
//! have reached so far, which handles optional and repeated particles without
//! backtracking. Each surviving match records which declaration consumed
//! each child; the children are then validated recursively against those
//! declarations.

use std::{borrow::Cow, collections::HashMap};

use folio_core::validate::Violation;

use crate::{
  dom::{Element, NS_XSI, Node},
  model::{
    AttributeDecl, ComplexType, ContentModel, ElementDecl, ElementType, Particle, SchemaModel,
    SimpleRef, SimpleType, Term, Variety,
  },
  simple::{WhiteSpace, normalize},
};

/// Limit on chains of named type derivations, which guards against cycles.
const MAX_DERIVATION_DEPTH: usize = 32;

// ─── Content-model matching ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Binding<'s> {
  Decl(&'s ElementDecl),
  Wildcard,
}

#[derive(Debug, Clone)]
struct State<'s> {
  pos:      usize,
  bindings: Vec<Binding<'s>>,
}

/// Keep the first state for every position.
fn dedup(states: Vec<State<'_>>) -> Vec<State<'_>> {
  let mut seen = Vec::new();
  states
    .into_iter()
    .filter(|s| {
      if seen.contains(&s.pos) {
        false
      } else {
        seen.push(s.pos);
        true
      }
    })
    .collect()
}

struct Matcher<'s, 'd> {
  model:    &'s SchemaModel,
  children: &'d [&'d Element],
}

impl<'s> Matcher<'s, '_> {
  fn element_at(&self, pos: usize, name: &str) -> bool {
    self.children.get(pos).is_some_and(|c| c.local == name)
  }

  fn particle(&self, particle: &'s Particle, states: Vec<State<'s>>) -> Vec<State<'s>> {
    let mut results: Vec<State<'s>> = Vec::new();
    let mut current = dedup(states);
    let mut count = 0u32;

    loop {
      if count >= particle.min {
        results.extend(current.iter().cloned());
      }
      if particle.max == Some(count) || current.is_empty() {
        break;
      }
      let mut next = dedup(self.term(&particle.term, current));
      count += 1;
      // Once the minimum is met, a repetition that lands on an already
      // reachable position adds nothing new.
      if count > particle.min {
        next.retain(|s| !results.iter().any(|r| r.pos == s.pos));
      }
      current = next;
    }

    dedup(results)
  }

  fn sequence(&self, particles: &[&'s Particle], mut states: Vec<State<'s>>) -> Vec<State<'s>> {
    for &particle in particles {
      if states.is_empty() {
        break;
      }
      states = self.particle(particle, states);
    }
    states
  }

  fn step(&self, states: Vec<State<'s>>, name: &str, binding: Binding<'s>) -> Vec<State<'s>> {
    states
      .into_iter()
      .filter(|s| self.element_at(s.pos, name))
      .map(|mut s| {
        s.pos += 1;
        s.bindings.push(binding);
        s
      })
      .collect()
  }

  fn term(&self, term: &'s Term, states: Vec<State<'s>>) -> Vec<State<'s>> {
    match term {
      Term::Element(decl) => self.step(states, &decl.name, Binding::Decl(decl)),
      Term::Ref(name) => match self.model.elements.get(name) {
        Some(decl) => self.step(states, name, Binding::Decl(decl)),
        None => Vec::new(),
      },
      Term::Any => states
        .into_iter()
        .filter(|s| s.pos < self.children.len())
        .map(|mut s| {
          s.pos += 1;
          s.bindings.push(Binding::Wildcard);
          s
        })
        .collect(),
      Term::Sequence(particles) => {
        let particles: Vec<&Particle> = particles.iter().collect();
        self.sequence(&particles, states)
      }
      Term::Choice(particles) => dedup(
        particles
          .iter()
          .flat_map(|p| self.particle(p, states.clone()))
          .collect(),
      ),
      Term::All(particles) => states.into_iter().filter_map(|s| self.all(particles, s)).collect(),
    }
  }

  /// Members of `xs:all` may appear in any order, each at most once.
  fn all(&self, particles: &'s [Particle], mut state: State<'s>) -> Option<State<'s>> {
    let mut used = vec![false; particles.len()];
    'children: while let Some(child) = self.children.get(state.pos) {
      for (i, particle) in particles.iter().enumerate() {
        if used[i] {
          continue;
        }
        let decl = match &particle.term {
          Term::Element(decl) => Some(decl),
          Term::Ref(name) => self.model.elements.get(name),
          _ => None,
        };
        if let Some(decl) = decl
          && decl.name == child.local
        {
          used[i] = true;
          state.pos += 1;
          state.bindings.push(Binding::Decl(decl));
          continue 'children;
        }
      }
      break;
    }
    let complete = particles.iter().zip(&used).all(|(p, used)| *used || p.min == 0);
    complete.then_some(state)
  }
}

// ─── Resolution ──────────────────────────────────────────────────────────────

enum Resolved<'s> {
  Any,
  Simple(Cow<'s, SimpleRef>),
  Complex(&'s ComplexType),
}

/// A complex type with its extension chain flattened.
struct Effective<'s> {
  particles:     Vec<&'s Particle>,
  simple:        Option<&'s SimpleRef>,
  attributes:    Vec<&'s AttributeDecl>,
  any_attribute: bool,
  mixed:         bool,
}

// ─── Validator ───────────────────────────────────────────────────────────────

pub struct Validation<'s> {
  model:      &'s SchemaModel,
  violations: Vec<Violation>,
}

impl<'s> Validation<'s> {
  pub fn new(model: &'s SchemaModel) -> Self { Self { model, violations: Vec::new() } }

  fn report(&mut self, path: &str, message: impl Into<String>) {
    self.violations.push(Violation::new(path, message));
  }

  /// Validate a whole document, starting from its root element.
  pub fn document(mut self, root: &Element) -> Vec<Violation> {
    // A schema without global elements places no constraint on documents.
    if self.model.elements.is_empty() {
      return self.violations;
    }

    let path = format!("/{}", root.local);
    let decl = self
      .model
      .elements
      .get(&root.local)
      .filter(|_| root.namespace == self.model.target_namespace);

    match decl {
      Some(decl) => self.element(root, decl, &path),
      None => {
        let namespace = root.namespace.as_deref().unwrap_or("no namespace");
        self.report(
          &path,
          format!("no global element declaration matches <{}> ({namespace})", root.local),
        );
      }
    }
    self.violations
  }

  fn resolve(&mut self, ty: &'s ElementType, path: &str) -> Option<Resolved<'s>> {
    match ty {
      ElementType::Any => Some(Resolved::Any),
      ElementType::Simple(r) => Some(Resolved::Simple(Cow::Borrowed(r))),
      ElementType::Complex(ct) => Some(Resolved::Complex(ct)),
      ElementType::Named(name) => {
        if let Some(ct) = self.model.complex_types.get(name) {
          Some(Resolved::Complex(ct))
        } else if self.model.simple_types.contains_key(name) {
          Some(Resolved::Simple(Cow::Owned(SimpleRef::Named(name.clone()))))
        } else {
          self.report(path, format!("type {name:?} is not declared"));
          None
        }
      }
    }
  }

  fn element(&mut self, el: &Element, decl: &'s ElementDecl, path: &str) {
    if el.attr_ns(NS_XSI, "nil").is_some_and(|v| matches!(v.trim(), "true" | "1")) {
      if !decl.nillable {
        self.report(path, format!("element <{}> is not nillable", el.local));
      } else if el.elements().next().is_some() || !el.text().is_empty() {
        self.report(path, "a nil element must be empty");
      }
      return;
    }

    let Some(resolved) = self.resolve(&decl.ty, path) else { return };

    match resolved {
      Resolved::Any => {}
      Resolved::Simple(r) => {
        if el.elements().next().is_some() {
          self.report(path, "element children are not allowed in a simple-typed element");
          return;
        }
        if let Some(attr) = el
          .attributes
          .iter()
          .find(|a| a.namespace.as_deref() != Some(NS_XSI))
        {
          self.report(path, format!("attribute {:?} is not allowed here", attr.local));
        }
        self.text_value(el, &r, decl.fixed.as_deref(), path);
      }
      Resolved::Complex(ct) => self.complex(el, ct, decl.fixed.as_deref(), path),
    }
  }

  fn complex(&mut self, el: &Element, ct: &'s ComplexType, fixed: Option<&str>, path: &str) {
    let Some(eff) = self.effective(ct, path) else { return };

    self.attributes(el, &eff.attributes, eff.any_attribute, path);

    if let Some(r) = eff.simple {
      if el.elements().next().is_some() {
        self.report(path, "element children are not allowed in simple content");
        return;
      }
      self.text_value(el, r, fixed, path);
      return;
    }

    if !eff.mixed
      && el
        .children
        .iter()
        .any(|n| matches!(n, Node::Text(t) if !t.trim().is_empty()))
    {
      self.report(path, "character data is not allowed here");
    }

    let children: Vec<&Element> = el.elements().collect();
    let matcher = Matcher { model: self.model, children: &children };
    let start = vec![State { pos: 0, bindings: Vec::new() }];
    let ends = matcher.sequence(&eff.particles, start);

    let Some(end) = ends.into_iter().find(|s| s.pos == children.len()) else {
      let found: Vec<&str> = children.iter().map(|c| c.local.as_str()).collect();
      self.report(
        path,
        format!(
          "content of <{}> does not match its declared model (found: [{}])",
          el.local,
          found.join(", ")
        ),
      );
      return;
    };

    let mut totals: HashMap<&str, usize> = HashMap::new();
    for child in &children {
      *totals.entry(child.local.as_str()).or_default() += 1;
    }
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (child, binding) in children.iter().zip(end.bindings) {
      let n = seen.entry(child.local.as_str()).or_default();
      *n += 1;
      let child_path = if totals[child.local.as_str()] > 1 {
        format!("{path}/{}[{n}]", child.local)
      } else {
        format!("{path}/{}", child.local)
      };
      match binding {
        Binding::Decl(decl) => self.element(child, decl, &child_path),
        // Lax: wildcard children are checked only when a global declaration exists.
        Binding::Wildcard => {
          let model = self.model;
          if let Some(decl) = model.elements.get(child.local.as_str()) {
            self.element(child, decl, &child_path);
          }
        }
      }
    }
  }

  fn effective(&mut self, ct: &'s ComplexType, path: &str) -> Option<Effective<'s>> {
    let mut chain = vec![ct];
    let mut current = ct;
    while let Some(base) = &current.base {
      let Some(next) = self.model.complex_types.get(base) else {
        self.report(path, format!("base type {base:?} is not declared"));
        return None;
      };
      if chain.len() > MAX_DERIVATION_DEPTH {
        self.report(path, format!("type derivation through {base:?} is circular"));
        return None;
      }
      chain.push(next);
      current = next;
    }

    let mut eff = Effective {
      particles:     Vec::new(),
      simple:        None,
      attributes:    Vec::new(),
      any_attribute: false,
      mixed:         ct.mixed,
    };
    // Base content comes first.
    for &link in chain.iter().rev() {
      match &link.content {
        ContentModel::Empty => {}
        ContentModel::Particle(p) => eff.particles.push(p),
        ContentModel::Simple(r) => eff.simple = Some(r),
      }
      for attr in &link.attributes {
        eff.attributes.retain(|a| a.name != attr.name);
        eff.attributes.push(attr);
      }
      eff.any_attribute |= link.any_attribute;
    }
    Some(eff)
  }

  fn attributes(
    &mut self,
    el: &Element,
    decls: &[&'s AttributeDecl],
    any_attribute: bool,
    path: &str,
  ) {
    for attr in &el.attributes {
      if attr.namespace.as_deref() == Some(NS_XSI) {
        continue;
      }
      let decl = decls
        .iter()
        .find(|d| attr.namespace.is_none() && d.name == attr.local && !d.prohibited);
      match decl {
        Some(decl) => {
          let at = format!("{path}/@{}", attr.local);
          if let Err(message) = self.simple_value(&decl.ty, &attr.value, 0) {
            self.report(&at, message);
          } else if let Some(fixed) = &decl.fixed
            && self.normalized(&decl.ty, &attr.value) != self.normalized(&decl.ty, fixed)
          {
            self.report(&at, format!("value must be {fixed:?}"));
          }
        }
        None if any_attribute => {}
        None => self.report(path, format!("attribute {:?} is not declared", attr.local)),
      }
    }

    for decl in decls.iter().filter(|d| d.required) {
      if el.attr(&decl.name).is_none() {
        self.report(path, format!("missing required attribute {:?}", decl.name));
      }
    }
  }

  fn text_value(&mut self, el: &Element, r: &SimpleRef, fixed: Option<&str>, path: &str) {
    let text = el.text();
    if let Err(message) = self.simple_value(r, &text, 0) {
      self.report(path, message);
    } else if let Some(fixed) = fixed
      && self.normalized(r, &text) != self.normalized(r, fixed)
    {
      self.report(path, format!("value must be {fixed:?}"));
    }
  }

  // ── Simple values ───────────────────────────────────────────────────────

  /// The whitespace rule of the built-in at the root of `r`.
  fn white_space(&self, r: &SimpleRef, depth: usize) -> WhiteSpace {
    if depth > MAX_DERIVATION_DEPTH {
      return WhiteSpace::Preserve;
    }
    match r {
      SimpleRef::Builtin(b) => b.white_space(),
      SimpleRef::Named(name) => match self.model.simple_types.get(name) {
        Some(st) => self.type_white_space(st, depth + 1),
        None => WhiteSpace::Preserve,
      },
      SimpleRef::Inline(st) => self.type_white_space(st, depth + 1),
    }
  }

  fn type_white_space(&self, st: &SimpleType, depth: usize) -> WhiteSpace {
    match &st.variety {
      Variety::Atomic(base) => self.white_space(base, depth),
      Variety::List(_) | Variety::Union => WhiteSpace::Collapse,
    }
  }

  fn normalized(&self, r: &SimpleRef, value: &str) -> String {
    normalize(value, self.white_space(r, 0))
  }

  fn simple_value(&self, r: &SimpleRef, value: &str, depth: usize) -> Result<(), String> {
    if depth > MAX_DERIVATION_DEPTH {
      return Err("simple type derivation is circular".into());
    }
    match r {
      SimpleRef::Builtin(b) => b.check(&normalize(value, b.white_space())),
      SimpleRef::Named(name) => match self.model.simple_types.get(name) {
        Some(st) => self.simple_type_value(st, value, depth + 1),
        None => Err(format!("simple type {name:?} is not declared")),
      },
      SimpleRef::Inline(st) => self.simple_type_value(st, value, depth + 1),
    }
  }

  fn simple_type_value(&self, st: &SimpleType, value: &str, depth: usize) -> Result<(), String> {
    match &st.variety {
      Variety::Atomic(base) => {
        self.simple_value(base, value, depth)?;
        let normalized = normalize(value, self.white_space(base, depth));
        st.facets.check(&normalized, normalized.chars().count())
      }
      Variety::List(item) => {
        let items: Vec<&str> = value.split_whitespace().collect();
        for item_value in &items {
          self.simple_value(item, item_value, depth)?;
        }
        st.facets.check(&items.join(" "), items.len())
      }
      Variety::Union => Ok(()),
    }
  }
}
