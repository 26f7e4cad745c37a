//! Node kinds produced by the parser and consumed by the renderer.
//!
//! Nodes are plain `Copy` values that refer to their children through
//! [`NodeId`]s into the parse's [`Arena`](super::arena::Arena). Text is either a
//! static literal or a span of the mangled input, so no node borrows the input.

use bitflags::bitflags;

use super::arena::{NodeArray, NodeId};

/// Text carried by a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Text {
    Static(&'static str),
    /// Byte range `start..end` of the mangled input.
    Input { start: usize, end: usize },
}

impl Text {
    pub const EMPTY: Text = Text::Static("");

    pub fn resolve<'a>(&self, input: &'a [u8]) -> &'a [u8] {
        match *self {
            Text::Static(s) => s.as_bytes(),
            Text::Input { start, end } => &input[start..end],
        }
    }

    pub fn is_empty(&self) -> bool {
        match *self {
            Text::Static(s) => s.is_empty(),
            Text::Input { start, end } => start == end,
        }
    }
}

bitflags! {
    /// `<CV-qualifiers> ::= [r] [V] [K]`
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub(crate) struct Qualifiers: u8 {
        const CONST = 1 << 0;
        const VOLATILE = 1 << 1;
        const RESTRICT = 1 << 2;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum RefQualifier {
    #[default]
    None,
    LValue,
    RValue,
}

/// Ordered so that reference collapsing is `min`: `& &&` is `&`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum RefKind {
    LValue,
    RValue,
}

/// The `St`-family abbreviations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SpecialSub {
    Allocator,
    BasicString,
    String,
    IStream,
    OStream,
    IOStream,
}

impl SpecialSub {
    pub fn from_code(code: u8) -> Option<SpecialSub> {
        Some(match code {
            b'a' => SpecialSub::Allocator,
            b'b' => SpecialSub::BasicString,
            b's' => SpecialSub::String,
            b'i' => SpecialSub::IStream,
            b'o' => SpecialSub::OStream,
            b'd' => SpecialSub::IOStream,
            _ => return None,
        })
    }

    /// Name as written in ordinary positions, without the `std::` prefix.
    pub fn short_name(self) -> &'static str {
        match self {
            SpecialSub::Allocator => "allocator",
            SpecialSub::BasicString => "basic_string",
            SpecialSub::String => "string",
            SpecialSub::IStream => "istream",
            SpecialSub::OStream => "ostream",
            SpecialSub::IOStream => "iostream",
        }
    }

    /// Spelling used as the prefix of a constructor or destructor name.
    pub fn expanded(self) -> &'static str {
        match self {
            SpecialSub::Allocator => "std::allocator",
            SpecialSub::BasicString => "std::basic_string",
            SpecialSub::String => {
                "std::basic_string<char, std::char_traits<char>, std::allocator<char> >"
            }
            SpecialSub::IStream => "std::basic_istream<char, std::char_traits<char> >",
            SpecialSub::OStream => "std::basic_ostream<char, std::char_traits<char> >",
            SpecialSub::IOStream => "std::basic_iostream<char, std::char_traits<char> >",
        }
    }

    /// Last component of the expanded name, used for `C1`/`D1` names.
    pub fn base_name(self) -> &'static str {
        match self {
            SpecialSub::Allocator => "allocator",
            SpecialSub::BasicString | SpecialSub::String => "basic_string",
            SpecialSub::IStream => "basic_istream",
            SpecialSub::OStream => "basic_ostream",
            SpecialSub::IOStream => "basic_iostream",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Node {
    // names
    Name(Text),
    NestedName { qual: NodeId, name: NodeId },
    LocalName { encoding: NodeId, entity: NodeId },
    StdQualifiedName(NodeId),
    QualifiedName { qualifier: NodeId, name: NodeId },
    GlobalQualifiedName(NodeId),
    NameWithTemplateArgs { name: NodeId, args: NodeId },
    TemplateArgs(NodeArray),
    AbiTagAttr { base: NodeId, tag: Text },
    CtorDtorName { base: NodeId, is_dtor: bool },
    DtorName(NodeId),
    ConversionOperator(NodeId),
    LiteralOperator(NodeId),
    UnnamedType(Text),
    ClosureType { params: NodeArray, count: Text },
    StructuredBinding(NodeArray),
    SpecialSubstitution(SpecialSub),
    ExpandedSpecialSubstitution(SpecialSub),

    // template parameter references, rendered as their target
    TemplateParam(NodeId),
    ForwardTemplateRef { index: usize, target: Option<NodeId> },

    // encodings
    FunctionEncoding {
        ret: Option<NodeId>,
        name: NodeId,
        params: NodeArray,
        cv: Qualifiers,
        ref_qual: RefQualifier,
    },
    SpecialName { prefix: &'static str, child: NodeId },
    CtorVtableSpecialName { first: NodeId, second: NodeId },
    DotSuffix { prefix: NodeId, suffix: Text },

    // types
    QualType { child: NodeId, quals: Qualifiers },
    VendorExtQualType { child: NodeId, ext: Text },
    PostfixQualifiedType { child: NodeId, postfix: &'static str },
    ElaboratedType { kind: &'static str, child: NodeId },
    Pointer(NodeId),
    Reference { pointee: NodeId, kind: RefKind },
    PointerToMember { class: NodeId, member: NodeId },
    Array { base: NodeId, dimension: Option<NodeId> },
    Function {
        ret: NodeId,
        params: NodeArray,
        cv: Qualifiers,
        ref_qual: RefQualifier,
        exception: Option<NodeId>,
    },
    NoexceptSpec(NodeId),
    DynamicExceptionSpec(NodeArray),
    Vector { base: NodeId, dimension: Option<NodeId> },
    PixelVector(NodeId),
    BinaryFloat(Text),

    // packs
    TemplateArgumentPack(NodeArray),
    ParameterPack(NodeArray),
    PackExpansion(NodeId),

    // expressions
    Binary { lhs: NodeId, op: &'static str, rhs: NodeId },
    Prefix { op: &'static str, child: NodeId },
    Postfix { child: NodeId, op: &'static str },
    Subscript { base: NodeId, index: NodeId },
    Member { lhs: NodeId, op: &'static str, rhs: NodeId },
    Conditional { cond: NodeId, then: NodeId, otherwise: NodeId },
    Call { callee: NodeId, args: NodeArray },
    New {
        exprs: NodeArray,
        ty: NodeId,
        inits: NodeArray,
        global: bool,
        array: bool,
    },
    Delete { child: NodeId, global: bool, array: bool },
    NamedCast { kind: &'static str, to: NodeId, from: NodeId },
    Conversion { ty: NodeId, exprs: NodeArray },
    Enclosing { prefix: &'static str, inner: NodeId },
    InitList { ty: Option<NodeId>, inits: NodeArray },
    Braced { elem: NodeId, init: NodeId, array: bool },
    BracedRange { first: NodeId, last: NodeId, init: NodeId },
    Throw(NodeId),
    /// `(... op pack)` and friends. A left fold's `init` comes first.
    Fold { left: bool, op: &'static str, pack: NodeId, init: Option<NodeId> },
    FunctionParam(Text),
    IntegerLiteral { ty: &'static str, value: Text },
    BoolLiteral(bool),
    /// Hex digits of the value's bit pattern, most significant first.
    FloatLiteral { kind: FloatKind, bits: Text },
    EnumLiteral { ty: NodeId, value: Text },
    StringLiteral(NodeId),
    LambdaLiteral(NodeId),
    SizeofPack(NodeId),
    NodeList(NodeArray),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FloatKind {
    Float,
    Double,
    /// x87 80-bit extended precision.
    LongDouble,
}

impl FloatKind {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'f' => Some(FloatKind::Float),
            b'd' => Some(FloatKind::Double),
            b'e' => Some(FloatKind::LongDouble),
            _ => None,
        }
    }

    /// Number of hex digits in the mangled value.
    pub fn digits(self) -> usize {
        match self {
            FloatKind::Float => 8,
            FloatKind::Double => 16,
            FloatKind::LongDouble => 20,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OpKind {
    Prefix,
    Postfix,
    Binary,
    Array,
    Member,
    New,
    Delete,
    Call,
    CCast,
    Conditional,
    NamedCast,
    OfType,
    OfExpr,
}

#[derive(Debug)]
pub(crate) struct OperatorInfo {
    pub code: [u8; 2],
    pub kind: OpKind,
    /// Array form for `new`/`delete`, pointer form for member access.
    pub flag: bool,
    /// Spelling inside expressions.
    pub symbol: &'static str,
    /// Spelling as a function name, if the operator can be declared.
    pub name: Option<&'static str>,
}

macro_rules! define_operators {
    ( $( $code:literal => $kind:ident, $flag:literal, $symbol:literal, $name:expr ; )* ) => {
        /// The `<operator-name>` table, sorted by code.
        pub(crate) static OPERATORS: &[OperatorInfo] = &[
            $(
                OperatorInfo {
                    code: *$code,
                    kind: OpKind::$kind,
                    flag: $flag,
                    symbol: $symbol,
                    name: $name,
                },
            )*
        ];
    };
}

define_operators! {
    b"aN" => Binary, false, "&=", Some("operator&=");
    b"aS" => Binary, false, "=", Some("operator=");
    b"aa" => Binary, false, "&&", Some("operator&&");
    b"ad" => Prefix, false, "&", Some("operator&");
    b"an" => Binary, false, "&", Some("operator&");
    b"at" => OfType, false, "alignof ", None;
    b"aw" => Prefix, false, "co_await", Some("operator co_await");
    b"az" => OfExpr, false, "alignof ", None;
    b"cc" => NamedCast, false, "const_cast", None;
    b"cl" => Call, false, "()", Some("operator()");
    b"cm" => Binary, false, ",", Some("operator,");
    b"co" => Prefix, false, "~", Some("operator~");
    b"cv" => CCast, false, "(cast)", None;
    b"dV" => Binary, false, "/=", Some("operator/=");
    b"da" => Delete, true, "delete[]", Some("operator delete[]");
    b"dc" => NamedCast, false, "dynamic_cast", None;
    b"de" => Prefix, false, "*", Some("operator*");
    b"dl" => Delete, false, "delete", Some("operator delete");
    b"ds" => Member, false, ".*", None;
    b"dt" => Member, false, ".", None;
    b"dv" => Binary, false, "/", Some("operator/");
    b"eO" => Binary, false, "^=", Some("operator^=");
    b"eo" => Binary, false, "^", Some("operator^");
    b"eq" => Binary, false, "==", Some("operator==");
    b"ge" => Binary, false, ">=", Some("operator>=");
    b"gt" => Binary, false, ">", Some("operator>");
    b"ix" => Array, false, "[]", Some("operator[]");
    b"lS" => Binary, false, "<<=", Some("operator<<=");
    b"le" => Binary, false, "<=", Some("operator<=");
    b"ls" => Binary, false, "<<", Some("operator<<");
    b"lt" => Binary, false, "<", Some("operator<");
    b"mI" => Binary, false, "-=", Some("operator-=");
    b"mL" => Binary, false, "*=", Some("operator*=");
    b"mi" => Binary, false, "-", Some("operator-");
    b"ml" => Binary, false, "*", Some("operator*");
    b"mm" => Postfix, false, "--", Some("operator--");
    b"na" => New, true, "new[]", Some("operator new[]");
    b"ne" => Binary, false, "!=", Some("operator!=");
    b"ng" => Prefix, false, "-", Some("operator-");
    b"nt" => Prefix, false, "!", Some("operator!");
    b"nw" => New, false, "new", Some("operator new");
    b"oR" => Binary, false, "|=", Some("operator|=");
    b"oo" => Binary, false, "||", Some("operator||");
    b"or" => Binary, false, "|", Some("operator|");
    b"pL" => Binary, false, "+=", Some("operator+=");
    b"pl" => Binary, false, "+", Some("operator+");
    b"pm" => Member, true, "->*", Some("operator->*");
    b"pp" => Postfix, false, "++", Some("operator++");
    b"ps" => Prefix, false, "+", Some("operator+");
    b"pt" => Member, true, "->", Some("operator->");
    b"qu" => Conditional, false, "?", Some("operator?");
    b"rM" => Binary, false, "%=", Some("operator%=");
    b"rS" => Binary, false, ">>=", Some("operator>>=");
    b"rc" => NamedCast, false, "reinterpret_cast", None;
    b"rm" => Binary, false, "%", Some("operator%");
    b"rs" => Binary, false, ">>", Some("operator>>");
    b"sc" => NamedCast, false, "static_cast", None;
    b"ss" => Binary, false, "<=>", Some("operator<=>");
    b"st" => OfType, false, "sizeof ", None;
    b"sz" => OfExpr, false, "sizeof ", None;
    b"te" => OfExpr, false, "typeid ", None;
    b"ti" => OfType, false, "typeid ", None;
}

/// Look up a two-character operator code.
pub(crate) fn find_operator(code: &[u8]) -> Option<&'static OperatorInfo> {
    let code = code.get(..2)?;
    OPERATORS
        .binary_search_by(|op| op.code[..].cmp(code))
        .ok()
        .map(|idx| &OPERATORS[idx])
}

/// `<builtin-type>` spellings for single-letter codes.
pub(crate) fn builtin_type(code: u8) -> Option<&'static str> {
    Some(match code {
        b'v' => "void",
        b'w' => "wchar_t",
        b'b' => "bool",
        b'c' => "char",
        b'a' => "signed char",
        b'h' => "unsigned char",
        b's' => "short",
        b't' => "unsigned short",
        b'i' => "int",
        b'j' => "unsigned int",
        b'l' => "long",
        b'm' => "unsigned long",
        b'x' => "long long",
        b'y' => "unsigned long long",
        b'n' => "__int128",
        b'o' => "unsigned __int128",
        b'f' => "float",
        b'd' => "double",
        b'e' => "long double",
        b'g' => "__float128",
        b'z' => "...",
        _ => return None,
    })
}

/// `<builtin-type>` spellings for `D`-prefixed codes.
pub(crate) fn extended_builtin_type(code: u8) -> Option<&'static str> {
    Some(match code {
        b'd' => "decimal64",
        b'e' => "decimal128",
        b'f' => "decimal32",
        b'h' => "half",
        b'i' => "char32_t",
        b's' => "char16_t",
        b'u' => "char8_t",
        b'a' => "auto",
        b'c' => "decltype(auto)",
        b'n' => "std::nullptr_t",
        _ => return None,
    })
}

/// Suffix or cast used when rendering an integer literal of the given builtin.
pub(crate) fn integer_literal_type(code: u8) -> Option<&'static str> {
    Some(match code {
        b'w' => "wchar_t",
        b'c' => "char",
        b'a' => "signed char",
        b'h' => "unsigned char",
        b's' => "short",
        b't' => "unsigned short",
        b'i' => "",
        b'j' => "u",
        b'l' => "l",
        b'm' => "ul",
        b'x' => "ll",
        b'y' => "ull",
        b'n' => "__int128",
        b'o' => "unsigned __int128",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_table_is_sorted() {
        assert!(OPERATORS.windows(2).all(|pair| pair[0].code < pair[1].code));
    }

    #[test]
    fn operator_lookup() {
        let op = find_operator(b"plx").expect("pl is in the table");
        assert_eq!(op.symbol, "+");
        assert_eq!(op.name, Some("operator+"));
        assert!(find_operator(b"zz").is_none());
        assert!(find_operator(b"p").is_none());
    }
}
