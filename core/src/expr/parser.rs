// flowrig/src/expr/parser.rs

//! pest-backed parser for flow expressions.
//!
//! A program is one or more statements. `NAME = flow` binds an alias that
//! later statements expand inline; a bare flow is the one to execute, and
//! when several are given the last one wins.

use crate::error::ParseError;
use crate::expr::ast::Node;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use std::collections::HashMap;
use tracing::{event, Level};

#[derive(Parser)]
#[grammar = "expr/flow.pest"]
struct FlowParser;

/// Parses `input` into a single root node.
pub fn parse(input: &str) -> Result<Node, ParseError> {
  if input.trim().is_empty() {
    return Err(ParseError::at(input, 0, "empty flow expression"));
  }

  let mut pairs = FlowParser::parse(Rule::program, input).map_err(|e| from_pest(input, e))?;
  let program = pairs
    .next()
    .ok_or_else(|| ParseError::at(input, 0, "empty flow expression"))?;

  let mut builder = AstBuilder {
    input,
    aliases: HashMap::new(),
  };
  let mut root = None;

  for statement in program.into_inner() {
    match statement.as_rule() {
      Rule::assignment => {
        let mut inner = statement.into_inner();
        let (name, body) = match (inner.next(), inner.next()) {
          (Some(name), Some(body)) => (name, body),
          _ => return Err(builder.malformed(0)),
        };
        let node = builder.flow(body)?;
        if builder.aliases.insert(name.as_str().to_string(), node).is_some() {
          event!(Level::DEBUG, alias = name.as_str(), "Alias redefined; later references use the new binding.");
        }
      }
      Rule::flow => root = Some(builder.flow(statement)?),
      Rule::EOI => {}
      _ => return Err(builder.malformed(statement.as_span().start())),
    }
  }

  root.ok_or_else(|| ParseError::at(input, input.len(), "expression defines aliases but no flow to execute"))
}

struct AstBuilder<'i> {
  input: &'i str,
  aliases: HashMap<String, Node>,
}

impl<'i> AstBuilder<'i> {
  fn flow(&self, pair: Pair<'i, Rule>) -> Result<Node, ParseError> {
    let steps = pair
      .into_inner()
      .map(|c| self.conditional(c))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Node::sequence(steps))
  }

  fn conditional(&self, pair: Pair<'i, Rule>) -> Result<Node, ParseError> {
    let position = pair.as_span().start();
    let mut inner = pair.into_inner();
    let head = inner.next().ok_or_else(|| self.malformed(position))?;
    let condition = self.term(head)?;

    match (inner.next(), inner.next()) {
      (None, _) => Ok(condition),
      (Some(when_true), Some(when_false)) => Ok(Node::conditional(
        condition,
        self.conditional(when_true)?,
        self.conditional(when_false)?,
      )),
      (Some(_), None) => Err(self.malformed(position)),
    }
  }

  fn term(&self, pair: Pair<'i, Rule>) -> Result<Node, ParseError> {
    match pair.as_rule() {
      Rule::ident => {
        let name = pair.as_str();
        Ok(match self.aliases.get(name) {
          Some(node) => node.clone(),
          None => Node::unit(name),
        })
      }
      Rule::group => {
        let branches = pair.into_inner().map(|b| self.flow(b)).collect::<Result<Vec<_>, _>>()?;
        Ok(Node::parallel(branches))
      }
      Rule::flow => self.flow(pair),
      _ => Err(self.malformed(pair.as_span().start())),
    }
  }

  fn malformed(&self, position: usize) -> ParseError {
    ParseError::at(self.input, position, "unexpected syntax tree shape")
  }
}

fn from_pest(input: &str, err: pest::error::Error<Rule>) -> ParseError {
  let position = match err.location {
    pest::error::InputLocation::Pos(pos) => pos,
    pest::error::InputLocation::Span((start, _)) => start,
  };
  ParseError::at(input, position, err.variant.message().into_owned())
}
