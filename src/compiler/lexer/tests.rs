use super::*;
use crate::compiler::stringtable::StringTable;

fn lex(src: &str) -> Vec<TokenKind> {
    let st = StringTable::new();
    Lexer::new(src, &st)
        .tokenize()
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

#[test]
fn test_keywords_and_idents() {
    let st = StringTable::new();
    let tokens = Lexer::new("int foo; return foo;", &st).tokenize().unwrap();
    let foo = st.insert("foo".into());
    assert_eq!(
        tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
        vec![
            TokenKind::Int,
            TokenKind::Ident(foo),
            TokenKind::Semicolon,
            TokenKind::Return,
            TokenKind::Ident(foo),
            TokenKind::Semicolon,
        ]
    );
}

#[test]
fn test_number_bases() {
    assert_eq!(
        lex("0 42 0x1F 017"),
        vec![
            TokenKind::IntLit(0),
            TokenKind::IntLit(42),
            TokenKind::IntLit(31),
            TokenKind::IntLit(15),
        ]
    );
}

#[test]
fn test_two_char_operators() {
    assert_eq!(
        lex("== != <= >= && || < > = !"),
        vec![
            TokenKind::Eq,
            TokenKind::Ne,
            TokenKind::Le,
            TokenKind::Ge,
            TokenKind::And,
            TokenKind::Or,
            TokenKind::Lt,
            TokenKind::Gt,
            TokenKind::Assign,
            TokenKind::Not,
        ]
    );
}

#[test]
fn test_comments_are_skipped() {
    assert_eq!(
        lex("1 // line comment\n 2 /* block\ncomment */ 3"),
        vec![
            TokenKind::IntLit(1),
            TokenKind::IntLit(2),
            TokenKind::IntLit(3),
        ]
    );
}

#[test]
fn test_line_numbers_advance() {
    let st = StringTable::new();
    let tokens = Lexer::new("1\n2\n\n3", &st).tokenize().unwrap();
    assert_eq!(
        tokens.iter().map(|t| t.line).collect::<Vec<_>>(),
        vec![1, 2, 4]
    );
}

#[test]
fn test_single_ampersand_is_an_error() {
    let st = StringTable::new();
    let errs = Lexer::new("a & b", &st).tokenize().unwrap_err();
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].kind, LexerErrorKind::UnexpectedChar('&'));
}

#[test]
fn test_unterminated_block_comment() {
    let st = StringTable::new();
    let errs = Lexer::new("1 /* never closed", &st).tokenize().unwrap_err();
    assert_eq!(errs[0].kind, LexerErrorKind::UnterminatedComment);
}
