//! Serialization of syntax trees back to source text

use super::SyntaxTree;

/// Turns a syntax tree into source text
pub trait Renderer: Send + Sync {
    fn render(&self, tree: &SyntaxTree) -> String;
}

/// Re-emits every token with the trivia it was parsed with
///
/// Untouched trees round-trip byte-for-byte. Statements spliced in from another
/// tree start on their own line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenRenderer;

impl Renderer for TokenRenderer {
    fn render(&self, tree: &SyntaxTree) -> String {
        let mut out = String::new();
        let mut previous_spliced = false;

        for (i, &stmt) in tree.statements().iter().enumerate() {
            let spliced = tree.is_spliced(stmt);

            for (j, leaf) in tree.leaves(stmt).into_iter().enumerate() {
                let node = tree.node(leaf);
                let mut leading = node.leading.as_str();
                if j == 0 && i == 0 && spliced {
                    leading = leading.trim_start();
                } else if j == 0
                    && i > 0
                    && (spliced || previous_spliced)
                    && !starts_on_new_line(leading)
                {
                    out.push('\n');
                    leading = leading.trim_start_matches([' ', '\t']);
                }
                out.push_str(leading);
                out.push_str(node.text.as_deref().unwrap_or_default());
            }

            previous_spliced = spliced;
        }

        out.push_str(tree.trailing());
        out
    }
}

/// Whether trivia breaks the line before any comment it carries
fn starts_on_new_line(leading: &str) -> bool {
    leading
        .split_once('\n')
        .is_some_and(|(first, _)| first.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{Language, SourceParser};

    fn parse(source: &str) -> SyntaxTree {
        SourceParser::new(Language::JavaScript)
            .unwrap()
            .parse(source)
            .unwrap()
    }

    #[test]
    fn test_round_trip_is_exact() {
        let source = "/* generated */\nimport x from 'x';\n\nexport const a = 1;a++;\n// end\n";
        assert_eq!(TokenRenderer.render(&parse(source)), source);
    }

    #[test]
    fn test_spliced_statement_gets_own_line() {
        let mut tree = parse("a();");
        let other = parse("b();");
        let graft = tree.graft(&other, other.statements()[0]);
        tree.push_statement(graft.root);

        assert_eq!(TokenRenderer.render(&tree), "a();\nb();");
    }

    #[test]
    fn test_statement_spliced_at_top_drops_blank_lines() {
        let mut tree = parse("a();\n");
        let other = parse("x();\n\nb();");
        let graft = tree.graft(&other, other.statements()[1]);
        tree.insert_statement(0, graft.root);

        assert_eq!(TokenRenderer.render(&tree), "b();\na();\n");
    }

    #[test]
    fn test_spliced_inner_declaration_drops_inline_indent() {
        let mut tree = parse("a();\n");
        let other = parse("export default function f() {}\n");
        let declaration = other.child_by_field(other.statements()[0], "declaration").unwrap();
        let graft = tree.graft(&other, declaration);
        tree.push_statement(graft.root);

        assert_eq!(TokenRenderer.render(&tree), "a();\nfunction f() {}\n");
    }

    #[test]
    fn test_header_comment_stays_below_spliced_import() {
        let mut tree = parse("/* header */\nimport x from 'x';\n");
        let other = parse("import y from 'y';\n");
        let graft = tree.graft(&other, other.statements()[0]);
        tree.insert_statement(0, graft.root);

        assert_eq!(
            TokenRenderer.render(&tree),
            "import y from 'y';\n/* header */\nimport x from 'x';\n"
        );
    }
}
