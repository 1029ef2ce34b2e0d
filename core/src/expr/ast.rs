// flowrig/src/expr/ast.rs

use std::fmt;

/// Parsed flow expression. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
  /// Leaf naming a registered unit.
  UnitRef { name: String },
  /// Steps run one after another.
  Sequence { steps: Vec<Node> },
  /// `condition ? when_true : when_false`. The last unit of `condition` routes.
  Conditional {
    condition: Box<Node>,
    when_true: Box<Node>,
    when_false: Box<Node>,
  },
  /// Branches fan out concurrently and join before the next step.
  ParallelGroup { branches: Vec<Node> },
}

impl Node {
  pub fn unit(name: impl Into<String>) -> Self {
    Node::UnitRef { name: name.into() }
  }

  /// Builds a sequence, splicing nested sequences into it.
  /// A single step is returned as-is.
  pub fn sequence(steps: impl IntoIterator<Item = Node>) -> Self {
    let mut flat = Vec::new();
    for step in steps {
      match step {
        Node::Sequence { steps } => flat.extend(steps),
        other => flat.push(other),
      }
    }
    if flat.len() == 1 {
      return flat.remove(0);
    }
    Node::Sequence { steps: flat }
  }

  pub fn conditional(condition: Node, when_true: Node, when_false: Node) -> Self {
    Node::Conditional {
      condition: Box::new(condition),
      when_true: Box::new(when_true),
      when_false: Box::new(when_false),
    }
  }

  pub fn parallel(branches: impl IntoIterator<Item = Node>) -> Self {
    Node::ParallelGroup {
      branches: branches.into_iter().collect(),
    }
  }

  /// Unit names in depth-first order, one entry per occurrence.
  pub fn leaf_names(&self) -> Vec<&str> {
    let mut out = Vec::new();
    self.collect_leaves(&mut out);
    out
  }

  fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a str>) {
    match self {
      Node::UnitRef { name } => out.push(name),
      Node::Sequence { steps } => steps.iter().for_each(|s| s.collect_leaves(out)),
      Node::Conditional {
        condition,
        when_true,
        when_false,
      } => {
        condition.collect_leaves(out);
        when_true.collect_leaves(out);
        when_false.collect_leaves(out);
      }
      Node::ParallelGroup { branches } => branches.iter().for_each(|b| b.collect_leaves(out)),
    }
  }

  /// `true` for nodes that contribute no unit at all.
  pub fn is_empty(&self) -> bool {
    match self {
      Node::UnitRef { .. } => false,
      Node::Sequence { steps } => steps.iter().all(Node::is_empty),
      Node::Conditional { .. } => false,
      Node::ParallelGroup { branches } => branches.iter().all(Node::is_empty),
    }
  }

  // Where a node may sit without parentheses: the ternary condition slot only
  // accepts terms, ternary arms accept conditionals.
  fn needs_parens_as_term(&self) -> bool {
    matches!(self, Node::Sequence { .. } | Node::Conditional { .. })
  }

  fn needs_parens_as_arm(&self) -> bool {
    matches!(self, Node::Sequence { .. })
  }
}

/// Renders EL text that parses back to an equal node.
impl fmt::Display for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Node::UnitRef { name } => f.write_str(name),
      Node::Sequence { steps } => {
        for (i, step) in steps.iter().enumerate() {
          if i > 0 {
            f.write_str(" -> ")?;
          }
          if step.needs_parens_as_arm() {
            write!(f, "({})", step)?;
          } else {
            write!(f, "{}", step)?;
          }
        }
        Ok(())
      }
      Node::Conditional {
        condition,
        when_true,
        when_false,
      } => {
        if condition.needs_parens_as_term() {
          write!(f, "({})", condition)?;
        } else {
          write!(f, "{}", condition)?;
        }
        f.write_str(" ? ")?;
        write_arm(f, when_true)?;
        f.write_str(" : ")?;
        write_arm(f, when_false)
      }
      Node::ParallelGroup { branches } => {
        f.write_str("(")?;
        for (i, branch) in branches.iter().enumerate() {
          if i > 0 {
            f.write_str(", ")?;
          }
          write!(f, "{}", branch)?;
        }
        f.write_str(")")
      }
    }
  }
}

fn write_arm(f: &mut fmt::Formatter<'_>, arm: &Node) -> fmt::Result {
  if arm.needs_parens_as_arm() {
    write!(f, "({})", arm)
  } else {
    write!(f, "{}", arm)
  }
}
