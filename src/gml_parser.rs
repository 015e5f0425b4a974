//! Reader for GML graph descriptions in the Internet Topology Zoo dialect.
//!
//! Only the structure matters to the generators: node ids, edge endpoints
//! and flat key/value attributes. Nested list attributes (`graphics [...]`
//! and friends) are skipped, and so is anything outside `graph [...]`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{Result, TopoError};

/// A node in a GML graph
#[derive(Debug, Clone)]
pub struct GmlNode {
    pub id: i64,
    pub label: Option<String>,
    pub attributes: HashMap<String, String>,
}

/// An edge in a GML graph
#[derive(Debug, Clone)]
pub struct GmlEdge {
    pub source: i64,
    pub target: i64,
    pub attributes: HashMap<String, String>,
}

/// A complete GML graph, nodes and edges in file order
#[derive(Debug, Clone, Default)]
pub struct GmlGraph {
    pub nodes: Vec<GmlNode>,
    pub edges: Vec<GmlEdge>,
    pub attributes: HashMap<String, String>,
}

fn gml_error(msg: impl Into<String>) -> TopoError {
    TopoError::Gml(msg.into())
}

fn parse_endpoint(which: &str, value: &str) -> Result<i64> {
    value
        .parse::<i64>()
        .map_err(|_| gml_error(format!("invalid edge {which}: {value}")))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    Number(String),
    String(String),
    LeftBracket,
    RightBracket,
    Eof,
}

struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn advance(&mut self) {
        if self.peek() == Some('\n') {
            self.line += 1;
        }
        self.position += 1;
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '#' {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn read_string(&mut self) -> Result<String> {
        let start_line = self.line;
        let mut result = String::new();
        self.advance();

        while let Some(ch) = self.peek() {
            self.advance();
            match ch {
                '"' => return Ok(result),
                '\\' => {
                    if let Some(escaped) = self.peek() {
                        self.advance();
                        match escaped {
                            'n' => result.push('\n'),
                            't' => result.push('\t'),
                            '"' => result.push('"'),
                            '\\' => result.push('\\'),
                            other => {
                                result.push('\\');
                                result.push(other);
                            }
                        }
                    }
                }
                _ => result.push(ch),
            }
        }

        Err(gml_error(format!("unterminated string starting on line {start_line}")))
    }

    fn read_word(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || matches!(ch, '_' | '.' | '-' | '+') {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace_and_comments();
        match self.peek() {
            None => Ok(Token::Eof),
            Some('[') => {
                self.advance();
                Ok(Token::LeftBracket)
            }
            Some(']') => {
                self.advance();
                Ok(Token::RightBracket)
            }
            Some('"') => Ok(Token::String(self.read_string()?)),
            Some(ch) if ch.is_alphabetic() || ch == '_' => Ok(Token::Identifier(self.read_word())),
            Some(ch) if ch.is_ascii_digit() || matches!(ch, '-' | '+' | '.') => {
                Ok(Token::Number(self.read_word()))
            }
            Some(ch) => Err(gml_error(format!(
                "unexpected character '{ch}' on line {}",
                self.line
            ))),
        }
    }
}

struct Parser {
    lexer: Lexer,
    current: Token,
}

/// A parsed attribute value; nested lists are not retained.
enum Value {
    Scalar(String),
    List,
}

impl Parser {
    fn new(mut lexer: Lexer) -> Result<Self> {
        let current = lexer.next_token()?;
        Ok(Self { lexer, current })
    }

    fn advance(&mut self) -> Result<()> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn line(&self) -> usize {
        self.lexer.line
    }

    fn expect_left_bracket(&mut self) -> Result<()> {
        if self.current != Token::LeftBracket {
            return Err(gml_error(format!(
                "expected '[' on line {}, found {:?}",
                self.line(),
                self.current
            )));
        }
        self.advance()
    }

    /// Consume a bracketed list whose '[' is the current token.
    fn skip_list(&mut self) -> Result<()> {
        self.expect_left_bracket()?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.current {
                Token::LeftBracket => depth += 1,
                Token::RightBracket => depth -= 1,
                Token::Eof => return Err(gml_error("unterminated list")),
                _ => {}
            }
            self.advance()?;
        }
        Ok(())
    }

    fn parse_value(&mut self) -> Result<Value> {
        match &self.current {
            Token::Identifier(v) | Token::Number(v) | Token::String(v) => {
                let value = v.clone();
                self.advance()?;
                Ok(Value::Scalar(value))
            }
            Token::LeftBracket => {
                self.skip_list()?;
                Ok(Value::List)
            }
            other => Err(gml_error(format!(
                "expected value on line {}, found {other:?}",
                self.line()
            ))),
        }
    }

    /// Parse `[ key value ... ]`, returning the scalar pairs in order.
    fn parse_record(&mut self, what: &str) -> Result<Vec<(String, String)>> {
        self.expect_left_bracket()?;
        let mut pairs = Vec::new();
        loop {
            match &self.current {
                Token::RightBracket => {
                    self.advance()?;
                    return Ok(pairs);
                }
                Token::Identifier(key) => {
                    let key = key.clone();
                    self.advance()?;
                    if let Value::Scalar(value) = self.parse_value()? {
                        pairs.push((key, value));
                    }
                }
                other => {
                    return Err(gml_error(format!(
                        "expected attribute name in {what} on line {}, found {other:?}",
                        self.line()
                    )))
                }
            }
        }
    }

    fn parse_node(&mut self) -> Result<GmlNode> {
        let mut id = None;
        let mut label = None;
        let mut attributes = HashMap::new();

        for (key, value) in self.parse_record("node")? {
            match key.as_str() {
                "id" => {
                    id = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_| gml_error(format!("invalid node id: {value}")))?,
                    )
                }
                "label" => label = Some(value),
                _ => {
                    attributes.insert(key, value);
                }
            }
        }

        let id = id.ok_or_else(|| gml_error("node missing required 'id' attribute"))?;
        Ok(GmlNode { id, label, attributes })
    }

    fn parse_edge(&mut self) -> Result<GmlEdge> {
        let mut source = None;
        let mut target = None;
        let mut attributes = HashMap::new();

        for (key, value) in self.parse_record("edge")? {
            match key.as_str() {
                "source" => source = Some(parse_endpoint("source", &value)?),
                "target" => target = Some(parse_endpoint("target", &value)?),
                _ => {
                    attributes.insert(key, value);
                }
            }
        }

        Ok(GmlEdge {
            source: source.ok_or_else(|| gml_error("edge missing required 'source' attribute"))?,
            target: target.ok_or_else(|| gml_error("edge missing required 'target' attribute"))?,
            attributes,
        })
    }

    fn parse_graph(&mut self) -> Result<GmlGraph> {
        self.expect_left_bracket()?;
        let mut graph = GmlGraph::default();

        loop {
            match &self.current {
                Token::RightBracket => {
                    self.advance()?;
                    return Ok(graph);
                }
                Token::Identifier(keyword) => match keyword.as_str() {
                    "node" => {
                        self.advance()?;
                        graph.nodes.push(self.parse_node()?);
                    }
                    "edge" => {
                        self.advance()?;
                        graph.edges.push(self.parse_edge()?);
                    }
                    _ => {
                        let key = keyword.clone();
                        self.advance()?;
                        if let Value::Scalar(value) = self.parse_value()? {
                            graph.attributes.insert(key, value);
                        }
                    }
                },
                other => {
                    return Err(gml_error(format!(
                        "expected keyword in graph on line {}, found {other:?}",
                        self.line()
                    )))
                }
            }
        }
    }

    /// Skip top-level `key value` pairs (e.g. `Creator "yFiles"`) until `graph`.
    fn parse_document(&mut self) -> Result<GmlGraph> {
        loop {
            match &self.current {
                Token::Identifier(key) if key == "graph" => {
                    self.advance()?;
                    return self.parse_graph();
                }
                Token::Identifier(_) => {
                    self.advance()?;
                    self.parse_value()?;
                }
                Token::Eof => return Err(gml_error("no 'graph' section found")),
                other => {
                    return Err(gml_error(format!(
                        "unexpected {other:?} before 'graph' on line {}",
                        self.line()
                    )))
                }
            }
        }
    }
}

/// Parse GML text into a [`GmlGraph`]
pub fn parse_gml_str(content: &str) -> Result<GmlGraph> {
    Parser::new(Lexer::new(content))?.parse_document()
}

/// Parse a GML file into a [`GmlGraph`]
pub fn parse_gml_file(path: &Path) -> Result<GmlGraph> {
    let content = fs::read_to_string(path)?;
    parse_gml_str(&content)
}
