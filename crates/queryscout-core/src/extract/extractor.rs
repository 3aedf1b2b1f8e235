//! Java call-site extractor using native tree-sitter
//!
//! Finds method invocations that produce a configured query-executing
//! type, folds their literal query argument, and harvests JPA entity
//! mappings from annotated classes. Receiver types are resolved from
//! whatever declarations the file itself provides (locals, fields,
//! parameters); call sites whose receiver type cannot be resolved are
//! skipped, not failed.

use std::collections::HashMap;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Parser, Query, QueryCursor};

use super::types::{EntityMapping, ExtractionRecord, QueryKind, SourceExtract, Span};
use crate::error::CoreError;

/// Receiver types that produce query objects, keyed by callee method.
fn produced_type(callee: &str, arg_count: usize) -> Option<(&'static str, &'static str, QueryKind)> {
    match callee {
        "createQuery" if arg_count >= 2 => Some((
            "javax.persistence.TypedQuery",
            "EntityManager",
            QueryKind::Jpql,
        )),
        "createQuery" | "createNamedQuery" => {
            Some(("javax.persistence.Query", "EntityManager", QueryKind::Jpql))
        }
        "createNativeQuery" => Some((
            "javax.persistence.Query",
            "EntityManager",
            QueryKind::NativeSql,
        )),
        "prepareStatement" | "prepareCall" => Some((
            "java.sql.PreparedStatement",
            "Connection",
            QueryKind::NativeSql,
        )),
        _ => None,
    }
}

/// Java query call-site extractor
pub struct QueryCallExtractor {
    parser: Parser,
    call_query: Query,
    decl_query: Query,
    class_query: Query,
    /// Fully-qualified query-executing types from configuration
    checked_types: Vec<String>,
}

impl QueryCallExtractor {
    pub fn new(checked_types: &[&str]) -> Result<Self, CoreError> {
        let mut parser = Parser::new();
        let language = tree_sitter_java::LANGUAGE;
        parser
            .set_language(&language.into())
            .map_err(|e| CoreError::ParserInit(format!("failed to set language: {}", e)))?;

        let call_query = Query::new(
            &language.into(),
            r#"
            (method_invocation
                object: (_)? @receiver
                name: (identifier) @callee
                arguments: (argument_list) @args
            ) @call
            "#,
        )
        .map_err(|e| CoreError::ParserInit(format!("failed to create call query: {}", e)))?;

        let decl_query = Query::new(
            &language.into(),
            r#"
            (local_variable_declaration
                type: (_) @type
                declarator: (variable_declarator
                    name: (identifier) @name
                    value: (_)? @value)
            )

            (field_declaration
                type: (_) @type
                declarator: (variable_declarator
                    name: (identifier) @name
                    value: (_)? @value)
            )

            (formal_parameter
                type: (_) @type
                name: (identifier) @name
            )
            "#,
        )
        .map_err(|e| CoreError::ParserInit(format!("failed to create decl query: {}", e)))?;

        let class_query = Query::new(
            &language.into(),
            r#"
            (class_declaration
                name: (identifier) @name
                body: (class_body) @body
            ) @class
            "#,
        )
        .map_err(|e| CoreError::ParserInit(format!("failed to create class query: {}", e)))?;

        Ok(Self {
            parser,
            call_query,
            decl_query,
            class_query,
            checked_types: checked_types.iter().map(|t| t.to_string()).collect(),
        })
    }

    /// Extract query call sites and entity mappings from one file.
    pub fn extract(&mut self, file: &str, source: &str) -> SourceExtract {
        let mut result = SourceExtract {
            file: file.to_string(),
            ..Default::default()
        };

        let tree = match self.parser.parse(source, None) {
            Some(t) => t,
            None => {
                result.errors.push("failed to parse source".to_string());
                return result;
            }
        };

        let root = tree.root_node();
        let source_bytes = source.as_bytes();

        let (symbols, constants) = self.collect_declarations(&root, source_bytes);
        self.extract_calls(&root, source_bytes, &symbols, &constants, &mut result);
        self.extract_entities(&root, source_bytes, &mut result);

        result
    }

    /// Pass 1: declared variable/field/parameter types plus string
    /// constants usable for literal folding.
    fn collect_declarations(
        &self,
        root: &Node,
        source: &[u8],
    ) -> (HashMap<String, String>, HashMap<String, String>) {
        let mut symbols: HashMap<String, String> = HashMap::new();
        let mut constants: HashMap<String, String> = HashMap::new();

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.decl_query, *root, source);

        while let Some(m) = matches.next() {
            let mut type_text = "";
            let mut name = "";
            let mut value: Option<Node> = None;

            for capture in m.captures {
                let capture_name = self.decl_query.capture_names()[capture.index as usize];
                match capture_name {
                    "type" => type_text = capture.node.utf8_text(source).unwrap_or(""),
                    "name" => name = capture.node.utf8_text(source).unwrap_or(""),
                    "value" => value = Some(capture.node),
                    _ => {}
                }
            }

            if name.is_empty() || type_text.is_empty() {
                continue;
            }

            let base = base_type_name(type_text);
            symbols.insert(name.to_string(), base.to_string());

            if base == "String" {
                if let Some(value) = value {
                    let (text, partial) = self.fold_literal(&value, source, &constants);
                    if !partial {
                        constants.insert(name.to_string(), text);
                    }
                }
            }
        }

        (symbols, constants)
    }

    /// Pass 2: query-producing method invocations.
    fn extract_calls(
        &self,
        root: &Node,
        source: &[u8],
        symbols: &HashMap<String, String>,
        constants: &HashMap<String, String>,
        result: &mut SourceExtract,
    ) {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.call_query, *root, source);

        while let Some(m) = matches.next() {
            let mut callee = "";
            let mut receiver: Option<Node> = None;
            let mut args: Option<Node> = None;
            let mut call: Option<Node> = None;

            for capture in m.captures {
                let capture_name = self.call_query.capture_names()[capture.index as usize];
                match capture_name {
                    "callee" => callee = capture.node.utf8_text(source).unwrap_or(""),
                    "receiver" => receiver = Some(capture.node),
                    "args" => args = Some(capture.node),
                    "call" => call = Some(capture.node),
                    _ => {}
                }
            }

            let (call, args) = match (call, args) {
                (Some(c), Some(a)) => (c, a),
                _ => continue,
            };

            let arg_count = args.named_child_count();
            let Some((produced, expected_receiver, kind)) = produced_type(callee, arg_count)
            else {
                continue;
            };

            // The produced type must be in the configured checked set.
            if !self.checked_types.iter().any(|t| t == produced) {
                continue;
            }

            // Resolve the call: either the receiver's declared type is
            // the expected producer, or the result is assigned to a
            // declared checked type. Unresolvable call sites are skipped.
            if !self.receiver_resolves(receiver, source, symbols, expected_receiver)
                && !self.result_type_resolves(&call, source)
            {
                continue;
            }

            let Some(first_arg) = args.named_child(0) else {
                continue;
            };

            let (query_text, partial) = self.fold_literal(&first_arg, source, constants);
            if query_text.is_empty() && !partial {
                continue;
            }

            result.records.push(ExtractionRecord {
                file: result.file.clone(),
                query_text,
                span: node_span(&call),
                kind,
                partial,
            });
        }
    }

    fn receiver_resolves(
        &self,
        receiver: Option<Node>,
        source: &[u8],
        symbols: &HashMap<String, String>,
        expected: &str,
    ) -> bool {
        let Some(receiver) = receiver else {
            return false;
        };
        // Accept `em` and `this.em`; anything more dynamic is left to
        // the result-type fallback.
        let name = match receiver.kind() {
            "identifier" => receiver.utf8_text(source).unwrap_or(""),
            "field_access" => receiver
                .child_by_field_name("field")
                .and_then(|n| n.utf8_text(source).ok())
                .unwrap_or(""),
            _ => return false,
        };
        symbols.get(name).map_or(false, |t| t == expected)
    }

    /// `Query q = em.createQuery(...)` resolves via the declared type
    /// even when the receiver itself is opaque.
    fn result_type_resolves(&self, call: &Node, source: &[u8]) -> bool {
        let Some(parent) = call.parent() else {
            return false;
        };
        if parent.kind() != "variable_declarator" {
            return false;
        }
        let Some(decl) = parent.parent() else {
            return false;
        };
        if decl.kind() != "local_variable_declaration" && decl.kind() != "field_declaration" {
            return false;
        }
        let Some(type_node) = decl.child_by_field_name("type") else {
            return false;
        };
        let declared = base_type_name(type_node.utf8_text(source).unwrap_or(""));
        self.checked_types
            .iter()
            .any(|t| t.rsplit('.').next() == Some(declared))
    }

    /// Constant-fold a literal expression: adjacent string literals
    /// joined with `+`, plus directly-assigned local/field constants.
    /// Anything else marks the result partial.
    fn fold_literal(
        &self,
        node: &Node,
        source: &[u8],
        constants: &HashMap<String, String>,
    ) -> (String, bool) {
        match node.kind() {
            "string_literal" => {
                let raw = node.utf8_text(source).unwrap_or("");
                (unquote(raw), false)
            }
            "binary_expression" => {
                let op = node
                    .child_by_field_name("operator")
                    .and_then(|n| n.utf8_text(source).ok())
                    .unwrap_or("");
                if op != "+" {
                    return (String::new(), true);
                }
                let (left, right) = (
                    node.child_by_field_name("left"),
                    node.child_by_field_name("right"),
                );
                match (left, right) {
                    (Some(l), Some(r)) => {
                        let (lt, lp) = self.fold_literal(&l, source, constants);
                        let (rt, rp) = self.fold_literal(&r, source, constants);
                        (format!("{}{}", lt, rt), lp || rp)
                    }
                    _ => (String::new(), true),
                }
            }
            "parenthesized_expression" => match node.named_child(0) {
                Some(inner) => self.fold_literal(&inner, source, constants),
                None => (String::new(), true),
            },
            "identifier" => {
                let name = node.utf8_text(source).unwrap_or("");
                match constants.get(name) {
                    Some(value) => (value.clone(), false),
                    None => (String::new(), true),
                }
            }
            _ => (String::new(), true),
        }
    }

    /// Harvest `@Entity`-annotated classes into entity mappings.
    fn extract_entities(&self, root: &Node, source: &[u8], result: &mut SourceExtract) {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.class_query, *root, source);

        while let Some(m) = matches.next() {
            let mut class: Option<Node> = None;
            let mut name = "";
            let mut body: Option<Node> = None;

            for capture in m.captures {
                let capture_name = self.class_query.capture_names()[capture.index as usize];
                match capture_name {
                    "class" => class = Some(capture.node),
                    "name" => name = capture.node.utf8_text(source).unwrap_or(""),
                    "body" => body = Some(capture.node),
                    _ => {}
                }
            }

            let (Some(class), Some(body)) = (class, body) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }

            let annotations = class_annotations(&class, source);
            if !annotations.contains_key("Entity") {
                continue;
            }

            let entity = annotations
                .get("Entity")
                .and_then(|args| args.get("name").cloned())
                .unwrap_or_else(|| name.to_string());
            let table = annotations
                .get("Table")
                .and_then(|args| args.get("name").cloned())
                .unwrap_or_else(|| name.to_lowercase());

            let mut columns = HashMap::new();
            let mut body_cursor = body.walk();
            for member in body.named_children(&mut body_cursor) {
                if member.kind() != "field_declaration" {
                    continue;
                }
                let Some(field_name) = member
                    .child_by_field_name("declarator")
                    .and_then(|d| d.child_by_field_name("name"))
                    .and_then(|n| n.utf8_text(source).ok())
                else {
                    continue;
                };
                let field_annotations = class_annotations(&member, source);
                if let Some(column) = field_annotations
                    .get("Column")
                    .and_then(|args| args.get("name").cloned())
                {
                    columns.insert(field_name.to_string(), column);
                }
            }

            result.entities.push(EntityMapping {
                entity,
                table,
                columns,
            });
        }
    }
}

/// Annotations on a class or field node: name -> (arg key -> value).
fn class_annotations(node: &Node, source: &[u8]) -> HashMap<String, HashMap<String, String>> {
    let mut out = HashMap::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "modifiers" {
            continue;
        }
        let mut mod_cursor = child.walk();
        for modifier in child.children(&mut mod_cursor) {
            match modifier.kind() {
                "marker_annotation" => {
                    if let Some(name) = modifier
                        .child_by_field_name("name")
                        .and_then(|n| n.utf8_text(source).ok())
                    {
                        out.insert(name.to_string(), HashMap::new());
                    }
                }
                "annotation" => {
                    let Some(name) = modifier
                        .child_by_field_name("name")
                        .and_then(|n| n.utf8_text(source).ok())
                    else {
                        continue;
                    };
                    let mut args = HashMap::new();
                    if let Some(arg_list) = modifier.child_by_field_name("arguments") {
                        let mut arg_cursor = arg_list.walk();
                        for arg in arg_list.named_children(&mut arg_cursor) {
                            if arg.kind() != "element_value_pair" {
                                continue;
                            }
                            let key = arg
                                .child_by_field_name("key")
                                .and_then(|n| n.utf8_text(source).ok())
                                .unwrap_or("");
                            let value = arg
                                .child_by_field_name("value")
                                .and_then(|n| n.utf8_text(source).ok())
                                .unwrap_or("");
                            if !key.is_empty() {
                                args.insert(key.to_string(), unquote(value));
                            }
                        }
                    }
                    out.insert(name.to_string(), args);
                }
                _ => {}
            }
        }
    }
    out
}

/// Base identifier of a Java type: strips packages and generics.
fn base_type_name(type_text: &str) -> &str {
    let no_generics = type_text.split('<').next().unwrap_or(type_text).trim();
    no_generics.rsplit('.').next().unwrap_or(no_generics)
}

fn unquote(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn node_span(node: &Node) -> Span {
    Span {
        start_offset: node.start_byte(),
        end_offset: node.end_byte(),
        begin_line: node.start_position().row as u32 + 1,
        end_line: node.end_position().row as u32 + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CHECKED_TYPES;

    fn extractor() -> QueryCallExtractor {
        let types: Vec<&str> = DEFAULT_CHECKED_TYPES.split(';').collect();
        QueryCallExtractor::new(&types).unwrap()
    }

    #[test]
    fn test_extract_create_query() {
        let source = r#"
            class UserDao {
                private EntityManager em;
                void find() {
                    em.createQuery("SELECT u FROM User u WHERE u.email = ?1");
                }
            }
        "#;
        let result = extractor().extract("UserDao.java", source);

        assert_eq!(result.records.len(), 1);
        let record = &result.records[0];
        assert_eq!(record.query_text, "SELECT u FROM User u WHERE u.email = ?1");
        assert_eq!(record.kind, QueryKind::Jpql);
        assert!(!record.partial);
        assert_eq!(record.span.begin_line, 5);
    }

    #[test]
    fn test_fold_concatenation_and_constant() {
        let source = r#"
            class UserDao {
                private EntityManager em;
                static final String TABLE = "User";
                void find() {
                    em.createQuery("SELECT u FROM " + TABLE + " u");
                }
            }
        "#;
        let result = extractor().extract("UserDao.java", source);

        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].query_text, "SELECT u FROM User u");
        assert!(!result.records[0].partial);
    }

    #[test]
    fn test_dynamic_fragment_is_partial() {
        let source = r#"
            class UserDao {
                private EntityManager em;
                void find(String filter) {
                    em.createQuery("SELECT u FROM User u WHERE " + buildFilter(filter));
                }
            }
        "#;
        let result = extractor().extract("UserDao.java", source);

        assert_eq!(result.records.len(), 1);
        assert!(result.records[0].partial);
    }

    #[test]
    fn test_unresolved_receiver_skipped() {
        let source = r#"
            class UserDao {
                void find() {
                    helper().createQuery("SELECT u FROM User u");
                }
            }
        "#;
        let result = extractor().extract("UserDao.java", source);
        assert!(result.records.is_empty());
    }

    #[test]
    fn test_declared_result_type_resolves() {
        let source = r#"
            class UserDao {
                void find() {
                    Query q = factory().createQuery("SELECT u FROM User u");
                }
            }
        "#;
        let result = extractor().extract("UserDao.java", source);
        assert_eq!(result.records.len(), 1);
    }

    #[test]
    fn test_prepare_statement_is_native_sql() {
        let source = r#"
            class ReportDao {
                private Connection conn;
                void run() {
                    conn.prepareStatement("SELECT * FROM reports WHERE id = ?");
                }
            }
        "#;
        let result = extractor().extract("ReportDao.java", source);

        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].kind, QueryKind::NativeSql);
    }

    #[test]
    fn test_entity_mapping() {
        let source = r#"
            @Entity
            @Table(name = "users")
            class User {
                @Column(name = "email_addr")
                private String email;
                private String name;
            }
        "#;
        let result = extractor().extract("User.java", source);

        assert_eq!(result.entities.len(), 1);
        let entity = &result.entities[0];
        assert_eq!(entity.entity, "User");
        assert_eq!(entity.table, "users");
        assert_eq!(entity.columns.get("email").unwrap(), "email_addr");
        assert!(!entity.columns.contains_key("name"));
    }

    #[test]
    fn test_non_query_calls_ignored() {
        let source = r#"
            class UserDao {
                private EntityManager em;
                void save(User u) {
                    em.persist(u);
                    log.info("saved");
                }
            }
        "#;
        let result = extractor().extract("UserDao.java", source);
        assert!(result.records.is_empty());
    }
}
