use logos::Logos;

/// Tokens of the filter/order expression language.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub(crate) enum Token<'src> {
    #[token("and", ignore(case))]
    And,

    #[token("or", ignore(case))]
    Or,

    #[token("not", ignore(case))]
    Not,

    #[token("in", ignore(case))]
    In,

    #[token("on", ignore(case))]
    On,

    #[token("true", ignore(case))]
    True,

    #[token("false", ignore(case))]
    False,

    #[token("null", ignore(case))]
    Null,

    #[token("asc", ignore(case))]
    #[token("ascending", ignore(case))]
    Asc,

    #[token("desc", ignore(case))]
    #[token("descending", ignore(case))]
    Desc,

    #[token("=")]
    Eq,

    #[token("!=")]
    #[token("not_equals", ignore(case))]
    Neq,

    #[token("<")]
    Lt,

    #[token(">")]
    Gt,

    #[token("<=")]
    Lte,

    #[token(">=")]
    Gte,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token(",")]
    Comma,

    #[token(".")]
    Dot,

    #[regex(r"-?[0-9]+\.[0-9]+", |lex| lex.slice())]
    Float(&'src str),

    #[regex(r"-?[0-9]+", |lex| lex.slice())]
    Int(&'src str),

    // Doubled backtick escapes a backtick.
    #[regex(r"`(?:[^`]|``)*`", |lex| lex.slice())]
    Quoted(&'src str),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice())]
    Ident(&'src str),
}

impl Token<'_> {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Float(s) | Token::Int(s) | Token::Quoted(s) => format!("'{s}'"),
            Token::Ident(s) => format!("identifier '{s}'"),
            Token::And => "'and'".into(),
            Token::Or => "'or'".into(),
            Token::Not => "'not'".into(),
            Token::In => "'in'".into(),
            Token::On => "'on'".into(),
            Token::True => "'true'".into(),
            Token::False => "'false'".into(),
            Token::Null => "'null'".into(),
            Token::Asc | Token::Desc => "direction".into(),
            Token::Eq => "'='".into(),
            Token::Neq => "'!='".into(),
            Token::Lt => "'<'".into(),
            Token::Gt => "'>'".into(),
            Token::Lte => "'<='".into(),
            Token::Gte => "'>='".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::LBracket => "'['".into(),
            Token::RBracket => "']'".into(),
            Token::Comma => "','".into(),
            Token::Dot => "'.'".into(),
        }
    }
}

/// Strips the surrounding backticks and collapses doubled backticks.
pub(crate) fn unquote(raw: &str) -> String {
    raw[1..raw.len() - 1].replace("``", "`")
}
