//! Recursive-descent parser for the Itanium C++ ABI mangling grammar.
//!
//! Every production is a method on [`Parser`] that consumes a prefix of the
//! remaining input and returns the [`NodeId`] it built. Failures propagate with
//! `?`; whatever was allocated so far is reclaimed by the arena reset that ends
//! every demangle call.
//!
//! See <https://itanium-cxx-abi.github.io/cxx-abi/abi.html#mangling> for the
//! grammar.

use std::cell::Cell;
use std::mem;

use super::arena::{Arena, NodeArray, NodeId};
use super::ast::{
    builtin_type, extended_builtin_type, find_operator, integer_literal_type, FloatKind, Node,
    OpKind, Qualifiers, RefKind, RefQualifier, SpecialSub, Text,
};
use super::error::{Error, Result};
use super::index_str::IndexStr;
use super::subs::{ForwardTemplateRefs, SubstitutionTable};

macro_rules! try_begin_parse {
    ($ctx:expr) => {
        let _auto_check_recursion = AutoParseRecursion::new($ctx)?;
    };
}

/// Common context needed when parsing.
#[derive(Debug, Clone)]
pub(crate) struct ParseContext {
    // Maximum amount of recursive parsing calls we will allow. If this is too
    // large, we can blow the stack.
    max_recursion: u32,
    recursion_level: Cell<u32>,
}

impl ParseContext {
    pub(crate) fn new(max_recursion: u32) -> ParseContext {
        ParseContext {
            max_recursion,
            recursion_level: Cell::new(0),
        }
    }

    #[inline]
    fn enter_recursion(&self) -> Result<()> {
        let new_recursion_level = self.recursion_level.get() + 1;

        if new_recursion_level >= self.max_recursion {
            Err(Error::TooMuchRecursion)
        } else {
            self.recursion_level.set(new_recursion_level);
            Ok(())
        }
    }

    #[inline]
    fn exit_recursion(&self) {
        let level = self.recursion_level.get();
        debug_assert!(level >= 1);
        self.recursion_level.set(level.saturating_sub(1));
    }
}

/// An RAII type to automatically check the recursion level against the
/// maximum. If the maximum has been crossed, return an error. Otherwise,
/// increment the level upon construction, and decrement it upon destruction.
struct AutoParseRecursion<'a>(&'a ParseContext);

impl<'a> AutoParseRecursion<'a> {
    #[inline]
    fn new(ctx: &'a ParseContext) -> Result<AutoParseRecursion<'a>> {
        ctx.enter_recursion()?;
        Ok(AutoParseRecursion(ctx))
    }
}

impl<'a> Drop for AutoParseRecursion<'a> {
    #[inline]
    fn drop(&mut self) {
        self.0.exit_recursion();
    }
}

/// What a template parameter at a given nesting level refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    /// The arguments of the most recent `<template-args>` of the current name.
    Outer,
    /// A generic lambda's invented parameters, rendered as `auto`.
    Unbound,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct TemplateScopes {
    levels: Vec<Scope>,
    outer: Vec<NodeId>,
}

impl TemplateScopes {
    fn clear(&mut self) {
        self.levels.clear();
        self.outer.clear();
    }
}

/// All per-parse storage. Owned by a `Demangler` and reset after every call.
#[derive(Debug, Default)]
pub(crate) struct Workspace {
    pub arena: Arena<Node>,
    pub subs: SubstitutionTable,
    pub forward_refs: ForwardTemplateRefs,
    pub scopes: TemplateScopes,
}

impl Workspace {
    pub fn reset(&mut self) {
        self.arena.reset();
        self.subs.clear();
        self.forward_refs.clear();
        self.scopes.clear();
    }
}

/// Facts about a function name that decide how its encoding is finished.
#[derive(Debug, Default)]
struct NameState {
    cv: Qualifiers,
    ref_qual: RefQualifier,
    ctor_dtor_conversion: bool,
    ends_with_template_args: bool,
    forward_refs_begin: usize,
}

impl NameState {
    fn new(forward_refs_begin: usize) -> Self {
        NameState {
            forward_refs_begin,
            ..Default::default()
        }
    }
}

pub(crate) struct Parser<'i, 'w> {
    original: &'i [u8],
    input: IndexStr<'i>,
    ctx: &'w ParseContext,
    ws: &'w mut Workspace,
    try_to_parse_template_args: bool,
    permit_forward_template_refs: bool,
    parsing_lambda_params_at_level: Option<usize>,
}

impl<'i, 'w> Parser<'i, 'w> {
    pub fn new(input: &'i [u8], ctx: &'w ParseContext, ws: &'w mut Workspace) -> Self {
        Parser {
            original: input,
            input: IndexStr::new(input),
            ctx,
            ws,
            try_to_parse_template_args: true,
            permit_forward_template_refs: false,
            parsing_lambda_params_at_level: None,
        }
    }

    // ---- cursor helpers ----

    #[inline]
    fn look(&self) -> u8 {
        self.input.peek().unwrap_or(0)
    }

    #[inline]
    fn look_at(&self, n: usize) -> u8 {
        self.input.peek_nth(n).unwrap_or(0)
    }

    #[inline]
    fn advance(&mut self, n: usize) {
        self.input = self.input.range_from(n.min(self.input.len())..);
    }

    fn consume_if(&mut self, prefix: &[u8]) -> bool {
        if self.input.starts_with(prefix) {
            self.advance(prefix.len());
            true
        } else {
            false
        }
    }

    fn expect(&mut self, prefix: &[u8]) -> Result<()> {
        if self.consume_if(prefix) {
            Ok(())
        } else {
            Err(self.error_here())
        }
    }

    fn error_here(&self) -> Error {
        if self.input.is_empty() {
            Error::UnexpectedEnd
        } else {
            Error::UnexpectedText
        }
    }

    fn rest(&mut self) -> Text {
        let start = self.input.index();
        let end = start + self.input.len();
        self.advance(self.input.len());
        Text::Input { start, end }
    }

    #[inline]
    fn make(&mut self, node: Node) -> NodeId {
        self.ws.arena.alloc(node)
    }

    #[inline]
    fn node(&self, id: NodeId) -> Node {
        self.ws.arena[id]
    }

    fn list(&mut self, ids: &[NodeId]) -> NodeArray {
        self.ws.arena.alloc_list(ids)
    }

    fn name(&mut self, text: &'static str) -> NodeId {
        self.make(Node::Name(Text::Static(text)))
    }

    /// None of these can start a `<type>`.
    fn is_end_of_encoding(&self) -> bool {
        matches!(self.input.peek(), None | Some(b'E' | b'.' | b'_'))
    }

    // ---- numbers ----

    /// `<number> ::= [n] <non-negative decimal integer>`, as raw text. Returns
    /// empty text and consumes nothing when no digits follow.
    fn parse_number(&mut self, allow_negative: bool) -> Text {
        let saved = self.input;
        let start = self.input.index();

        if allow_negative {
            self.consume_if(b"n");
        }

        if !self.look().is_ascii_digit() {
            self.input = saved;
            return Text::EMPTY;
        }

        while self.look().is_ascii_digit() {
            self.advance(1);
        }

        Text::Input {
            start,
            end: self.input.index(),
        }
    }

    fn parse_positive_integer(&mut self) -> Result<usize> {
        if !self.look().is_ascii_digit() {
            return Err(self.error_here());
        }

        let mut value: usize = 0;
        while self.look().is_ascii_digit() {
            let digit = (self.look() - b'0') as usize;
            value = value
                .checked_mul(10)
                .and_then(|value| value.checked_add(digit))
                .ok_or(Error::Overflow)?;
            self.advance(1);
        }

        Ok(value)
    }

    /// `<seq-id> ::= <0-9A-Z>+`
    fn parse_seq_id(&mut self) -> Result<usize> {
        let digit = |c: u8| match c {
            b'0'..=b'9' => Some((c - b'0') as usize),
            b'A'..=b'Z' => Some((c - b'A') as usize + 10),
            _ => None,
        };

        if digit(self.look()).is_none() {
            return Err(self.error_here());
        }

        let mut value: usize = 0;
        while let Some(d) = digit(self.look()) {
            value = value
                .checked_mul(36)
                .and_then(|value| value.checked_add(d))
                .ok_or(Error::Overflow)?;
            self.advance(1);
        }

        Ok(value)
    }

    /// `_ <digit>` or `__ <number> _`, after a local entity.
    fn skip_discriminator(&mut self) {
        if self.look() != b'_' {
            return;
        }

        if self.look_at(1).is_ascii_digit() {
            self.advance(2);
            return;
        }

        if self.look_at(1) == b'_' {
            let saved = self.input;
            self.advance(2);
            let number = self.parse_number(false);
            if number.is_empty() || !self.consume_if(b"_") {
                self.input = saved;
            }
        }
    }

    // ---- top level ----

    /// ```text
    /// <mangled-name> ::= _Z <encoding> [. <clone-suffix>]
    ///                ::= ___Z <encoding> _block_invoke[_<number>]
    ///                ::= <type>
    /// ```
    pub fn parse(mut self) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        if self.consume_if(b"_Z") || self.consume_if(b"__Z") {
            let internal_linkage = self.look() == b'L';
            let encoding = self.parse_encoding()?;

            if !internal_linkage && self.is_bare_name(encoding) {
                return Err(Error::UnexpectedEnd);
            }

            let encoding = if self.look() == b'.' {
                let suffix = self.rest();
                self.make(Node::DotSuffix {
                    prefix: encoding,
                    suffix,
                })
            } else {
                encoding
            };

            return self.finish(encoding);
        }

        if self.consume_if(b"___Z") || self.consume_if(b"____Z") {
            let encoding = self.parse_encoding()?;
            self.expect(b"_block_invoke")?;

            let require_number = self.consume_if(b"_");
            if self.parse_number(false).is_empty() && require_number {
                return Err(self.error_here());
            }
            if self.look() == b'.' {
                self.rest();
            }

            let block = self.make(Node::SpecialName {
                prefix: "invocation function for block in ",
                child: encoding,
            });
            return self.finish(block);
        }

        let ty = self.parse_type()?;
        self.finish(ty)
    }

    fn finish(&mut self, root: NodeId) -> Result<NodeId> {
        if !self.input.is_empty() {
            return Err(Error::UnexpectedText);
        }
        if !self.ws.forward_refs.is_empty() {
            return Err(Error::UnresolvedForwardReference);
        }
        Ok(root)
    }

    /// A global-namespace variable name on its own is never mangled.
    fn is_bare_name(&self, id: NodeId) -> bool {
        match self.node(id) {
            Node::Name(_) => true,
            _ => false,
        }
    }

    /// ```text
    /// <encoding> ::= <function name> <bare-function-type>
    ///            ::= <data name>
    ///            ::= <special-name>
    /// ```
    fn parse_encoding(&mut self) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        // nested encodings see their own template parameters only
        let saved = mem::take(&mut self.ws.scopes);
        let result = self.parse_encoding_inner();
        self.ws.scopes = saved;
        result
    }

    fn parse_encoding_inner(&mut self) -> Result<NodeId> {
        if matches!(self.look(), b'G' | b'T') {
            return self.parse_special_name();
        }

        let mut state = NameState::new(self.ws.forward_refs.len());
        let name = self.parse_name(Some(&mut state))?;
        self.resolve_forward_template_refs(&state)?;

        if self.is_end_of_encoding() {
            return Ok(name);
        }

        let ret = if !state.ctor_dtor_conversion && state.ends_with_template_args {
            Some(self.parse_type()?)
        } else {
            None
        };

        let mut params = Vec::new();
        if !self.consume_if(b"v") {
            loop {
                params.push(self.parse_type()?);
                if self.is_end_of_encoding() {
                    break;
                }
            }
        }

        let params = self.list(&params);
        Ok(self.make(Node::FunctionEncoding {
            ret,
            name,
            params,
            cv: state.cv,
            ref_qual: state.ref_qual,
        }))
    }

    /// Patch every forward reference created while parsing the current name.
    fn resolve_forward_template_refs(&mut self, state: &NameState) -> Result<()> {
        let begin = state.forward_refs_begin;

        for idx in begin..self.ws.forward_refs.len() {
            let id = self.ws.forward_refs[idx];
            let Node::ForwardTemplateRef { index, .. } = self.node(id) else {
                return Err(Error::UnresolvedForwardReference);
            };

            let target = match self.ws.scopes.levels.first() {
                Some(Scope::Outer) => self.ws.scopes.outer.get(index).copied(),
                _ => None,
            }
            .ok_or(Error::UnresolvedForwardReference)?;

            self.ws.arena[id] = Node::ForwardTemplateRef {
                index,
                target: Some(target),
            };
        }

        self.ws.forward_refs.truncate(begin);
        Ok(())
    }

    /// ```text
    /// <special-name> ::= TV <type>    # virtual table
    ///                ::= TT <type>    # VTT structure
    ///                ::= TI <type>    # typeinfo structure
    ///                ::= TS <type>    # typeinfo name
    ///                ::= Tc <call-offset> <call-offset> <base encoding>
    ///                ::= Th <call-offset> <base encoding>
    ///                ::= Tv <call-offset> <base encoding>
    ///                ::= TC <type> <number> _ <type>
    ///                ::= TW <name>    # thread-local wrapper
    ///                ::= TH <name>    # thread-local initialization
    ///                ::= TA <template-arg>
    ///                ::= GV <name>    # guard variable
    ///                ::= GR <name> [<seq-id>] _
    ///                ::= GA <encoding>
    /// ```
    fn parse_special_name(&mut self) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        let type_prefix = match (self.look(), self.look_at(1)) {
            (b'T', b'V') => Some("vtable for "),
            (b'T', b'T') => Some("VTT for "),
            (b'T', b'I') => Some("typeinfo for "),
            (b'T', b'S') => Some("typeinfo name for "),
            _ => None,
        };
        if let Some(prefix) = type_prefix {
            self.advance(2);
            let child = self.parse_type()?;
            return Ok(self.make(Node::SpecialName { prefix, child }));
        }

        let name_prefix = match (self.look(), self.look_at(1)) {
            (b'T', b'W') => Some("thread-local wrapper routine for "),
            (b'T', b'H') => Some("thread-local initialization routine for "),
            (b'G', b'V') => Some("guard variable for "),
            _ => None,
        };
        if let Some(prefix) = name_prefix {
            self.advance(2);
            let child = self.parse_name(None)?;
            return Ok(self.make(Node::SpecialName { prefix, child }));
        }

        if self.consume_if(b"Tc") {
            self.parse_call_offset()?;
            self.parse_call_offset()?;
            let child = self.parse_encoding()?;
            return Ok(self.make(Node::SpecialName {
                prefix: "covariant return thunk to ",
                child,
            }));
        }

        if self.consume_if(b"TC") {
            let derived = self.parse_type()?;
            if self.parse_number(true).is_empty() {
                return Err(self.error_here());
            }
            self.expect(b"_")?;
            let base = self.parse_type()?;
            return Ok(self.make(Node::CtorVtableSpecialName {
                first: base,
                second: derived,
            }));
        }

        if self.consume_if(b"TA") {
            let child = self.parse_template_arg()?;
            return Ok(self.make(Node::SpecialName {
                prefix: "template parameter object for ",
                child,
            }));
        }

        if self.consume_if(b"GR") {
            let child = self.parse_name(None)?;
            if !self.consume_if(b"_") {
                self.parse_seq_id()?;
                self.expect(b"_")?;
            }
            return Ok(self.make(Node::SpecialName {
                prefix: "reference temporary for ",
                child,
            }));
        }

        if self.consume_if(b"GA") {
            let child = self.parse_encoding()?;
            return Ok(self.make(Node::SpecialName {
                prefix: "hidden alias for ",
                child,
            }));
        }

        if self.consume_if(b"T") {
            let is_virtual = self.look() == b'v';
            self.parse_call_offset()?;
            let child = self.parse_encoding()?;
            let prefix = if is_virtual {
                "virtual thunk to "
            } else {
                "non-virtual thunk to "
            };
            return Ok(self.make(Node::SpecialName { prefix, child }));
        }

        Err(self.error_here())
    }

    /// ```text
    /// <call-offset> ::= h <nv-offset> _
    ///               ::= v <v-offset> _
    /// <nv-offset>   ::= <offset number>
    /// <v-offset>    ::= <offset number> _ <virtual offset number>
    /// ```
    fn parse_call_offset(&mut self) -> Result<()> {
        if self.consume_if(b"h") {
            if self.parse_number(true).is_empty() {
                return Err(self.error_here());
            }
            return self.expect(b"_");
        }

        if self.consume_if(b"v") {
            if self.parse_number(true).is_empty() {
                return Err(self.error_here());
            }
            self.expect(b"_")?;
            if self.parse_number(true).is_empty() {
                return Err(self.error_here());
            }
            return self.expect(b"_");
        }

        Err(self.error_here())
    }

    // ---- names ----

    /// ```text
    /// <name> ::= <nested-name>
    ///        ::= <local-name>
    ///        ::= <unscoped-template-name> <template-args>
    ///        ::= <unscoped-name>
    /// ```
    fn parse_name(&mut self, mut state: Option<&mut NameState>) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        match self.look() {
            b'N' => return self.parse_nested_name(state),
            b'Z' => return self.parse_local_name(state),
            _ => {}
        }

        // <unscoped-template-name> may be a substitution
        if self.look() == b'S' && self.look_at(1) != b't' {
            let sub = self.parse_substitution()?;
            if self.look() != b'I' {
                return Err(self.error_here());
            }

            let args = self.parse_template_args(state.is_some())?;
            if let Some(state) = state {
                state.ends_with_template_args = true;
            }
            return Ok(self.make(Node::NameWithTemplateArgs { name: sub, args }));
        }

        let name = self.parse_unscoped_name(state.as_deref_mut())?;

        if self.look() == b'I' {
            self.ws.subs.insert(name)?;
            let args = self.parse_template_args(state.is_some())?;
            if let Some(state) = state {
                state.ends_with_template_args = true;
            }
            return Ok(self.make(Node::NameWithTemplateArgs { name, args }));
        }

        Ok(name)
    }

    /// ```text
    /// <unscoped-name> ::= [L] <unqualified-name>
    ///                 ::= St [L] <unqualified-name>   # ::std::
    /// ```
    fn parse_unscoped_name(&mut self, state: Option<&mut NameState>) -> Result<NodeId> {
        if self.consume_if(b"St") {
            self.consume_if(b"L");
            let name = self.parse_unqualified_name(state)?;
            return Ok(self.make(Node::StdQualifiedName(name)));
        }

        self.consume_if(b"L");
        self.parse_unqualified_name(state)
    }

    /// ```text
    /// <unqualified-name> ::= <operator-name> [<abi-tags>]
    ///                    ::= <ctor-dtor-name>
    ///                    ::= <source-name> [<abi-tags>]
    ///                    ::= <unnamed-type-name>
    ///                    ::= DC <source-name>+ E   # structured binding
    /// ```
    fn parse_unqualified_name(&mut self, state: Option<&mut NameState>) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        let name = match self.look() {
            b'U' => self.parse_unnamed_type_name()?,
            b'1'..=b'9' => self.parse_source_name()?,
            b'D' if self.look_at(1) == b'C' => {
                self.advance(2);
                let mut names = Vec::new();
                loop {
                    names.push(self.parse_source_name()?);
                    if self.consume_if(b"E") {
                        break;
                    }
                }
                let names = self.list(&names);
                self.make(Node::StructuredBinding(names))
            }
            _ => self.parse_operator_name(state)?,
        };

        self.parse_abi_tags(name)
    }

    /// `<source-name> ::= <positive length number> <identifier>`
    fn parse_source_name(&mut self) -> Result<NodeId> {
        let text = self.parse_bare_source_name()?;
        let anonymous = text.resolve(self.original).starts_with(b"_GLOBAL__N");

        if anonymous {
            Ok(self.name("(anonymous namespace)"))
        } else {
            Ok(self.make(Node::Name(text)))
        }
    }

    fn parse_bare_source_name(&mut self) -> Result<Text> {
        let len = self.parse_positive_integer()?;
        if len == 0 {
            return Err(Error::UnexpectedText);
        }

        let (head, tail) = self.input.try_split_at(len).ok_or(Error::UnexpectedEnd)?;
        self.input = tail;

        Ok(Text::Input {
            start: head.index(),
            end: head.index() + len,
        })
    }

    /// `<abi-tags> ::= <abi-tag> [<abi-tags>]`, `<abi-tag> ::= B <source-name>`
    fn parse_abi_tags(&mut self, mut node: NodeId) -> Result<NodeId> {
        while self.consume_if(b"B") {
            let tag = self.parse_bare_source_name()?;
            node = self.make(Node::AbiTagAttr { base: node, tag });
        }
        Ok(node)
    }

    /// ```text
    /// <unnamed-type-name> ::= Ut [<nonnegative number>] _
    ///                     ::= <closure-type-name>
    /// <closure-type-name> ::= Ul <lambda-sig> E [<nonnegative number>] _
    /// <lambda-sig>        ::= <parameter type>+
    /// ```
    fn parse_unnamed_type_name(&mut self) -> Result<NodeId> {
        if self.consume_if(b"Ut") {
            let count = self.parse_number(false);
            self.expect(b"_")?;
            return Ok(self.make(Node::UnnamedType(count)));
        }

        if self.consume_if(b"Ul") {
            let depth = self.ws.scopes.levels.len();
            let saved_level = self.parsing_lambda_params_at_level.replace(depth);
            let params = self.parse_lambda_params();
            self.ws.scopes.levels.truncate(depth);
            self.parsing_lambda_params_at_level = saved_level;
            let params = params?;

            let count = self.parse_number(false);
            self.expect(b"_")?;
            return Ok(self.make(Node::ClosureType { params, count }));
        }

        Err(self.error_here())
    }

    fn parse_lambda_params(&mut self) -> Result<NodeArray> {
        let mut params = Vec::new();

        if !self.consume_if(b"vE") {
            loop {
                params.push(self.parse_type()?);
                if self.consume_if(b"E") {
                    break;
                }
            }
        }

        Ok(self.list(&params))
    }

    /// ```text
    /// <nested-name> ::= N [<CV-qualifiers>] [<ref-qualifier>] <prefix> <unqualified-name> E
    ///               ::= N [<CV-qualifiers>] [<ref-qualifier>] <template-prefix> <template-args> E
    /// ```
    fn parse_nested_name(&mut self, mut state: Option<&mut NameState>) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        self.expect(b"N")?;

        let cv = self.parse_cv_qualifiers();
        let ref_qual = if self.consume_if(b"O") {
            RefQualifier::RValue
        } else if self.consume_if(b"R") {
            RefQualifier::LValue
        } else {
            RefQualifier::None
        };

        if let Some(state) = state.as_deref_mut() {
            state.cv = cv;
            state.ref_qual = ref_qual;
        }

        let mut so_far: Option<NodeId> = None;

        if self.consume_if(b"St") {
            so_far = Some(self.name("std"));
        }

        while !self.consume_if(b"E") {
            if self.input.is_empty() {
                return Err(Error::UnexpectedEnd);
            }

            self.consume_if(b"L");

            // <data-member-prefix> ::= <member source-name> [<template-args>] M
            if self.consume_if(b"M") {
                if so_far.is_none() {
                    return Err(Error::UnexpectedText);
                }
                continue;
            }

            match (self.look(), self.look_at(1)) {
                (b'T', _) => {
                    let param = self.parse_template_param()?;
                    let node = self.push_component(&mut so_far, param, state.as_deref_mut());
                    self.ws.subs.insert(node)?;
                }
                (b'I', _) => {
                    let prefix = so_far.ok_or(Error::UnexpectedText)?;
                    let args = self.parse_template_args(state.is_some())?;
                    let node = self.make(Node::NameWithTemplateArgs { name: prefix, args });
                    so_far = Some(node);
                    if let Some(state) = state.as_deref_mut() {
                        state.ends_with_template_args = true;
                    }
                    self.ws.subs.insert(node)?;
                }
                (b'D', b't' | b'T') => {
                    let decltype = self.parse_decltype()?;
                    let node = self.push_component(&mut so_far, decltype, state.as_deref_mut());
                    self.ws.subs.insert(node)?;
                }
                (b'S', second) if second != b't' => {
                    let sub = self.parse_substitution()?;
                    let node = self.push_component(&mut so_far, sub, state.as_deref_mut());
                    if node != sub {
                        self.ws.subs.insert(node)?;
                    }
                }
                (b'C', _) | (b'D', _) if self.look_at(1) != b'C' => {
                    let prefix = so_far.ok_or(Error::UnexpectedText)?;
                    let (prefix, ctor_dtor) =
                        self.parse_ctor_dtor_name(prefix, state.as_deref_mut())?;
                    so_far = Some(prefix);
                    let node = self.push_component(&mut so_far, ctor_dtor, state.as_deref_mut());
                    let node = self.parse_abi_tags(node)?;
                    so_far = Some(node);
                    self.ws.subs.insert(node)?;
                }
                _ => {
                    let name = self.parse_unqualified_name(state.as_deref_mut())?;
                    let node = self.push_component(&mut so_far, name, state.as_deref_mut());
                    self.ws.subs.insert(node)?;
                }
            }
        }

        let so_far = so_far.ok_or(Error::UnexpectedText)?;

        // the complete name is not a candidate prefix
        if self.ws.subs.pop().is_none() {
            return Err(Error::UnexpectedText);
        }

        Ok(so_far)
    }

    fn push_component(
        &mut self,
        so_far: &mut Option<NodeId>,
        component: NodeId,
        state: Option<&mut NameState>,
    ) -> NodeId {
        let node = match *so_far {
            Some(qual) => self.make(Node::NestedName {
                qual,
                name: component,
            }),
            None => component,
        };

        *so_far = Some(node);
        if let Some(state) = state {
            state.ends_with_template_args = false;
        }

        node
    }

    /// ```text
    /// <ctor-dtor-name> ::= C1 | C2 | C3 | C4 | C5
    ///                  ::= CI1 <type> | CI2 <type>   # inheriting constructor
    ///                  ::= D0 | D1 | D2 | D4 | D5
    /// ```
    ///
    /// Returns the prefix, expanded when it is one of the `std` abbreviations,
    /// together with the constructor or destructor name.
    fn parse_ctor_dtor_name(
        &mut self,
        prefix: NodeId,
        mut state: Option<&mut NameState>,
    ) -> Result<(NodeId, NodeId)> {
        let prefix = match self.node(prefix) {
            Node::SpecialSubstitution(kind) => self.make(Node::ExpandedSpecialSubstitution(kind)),
            _ => prefix,
        };

        if self.consume_if(b"C") {
            let inheriting = self.consume_if(b"I");
            if !matches!(self.look(), b'1'..=b'5') {
                return Err(self.error_here());
            }
            self.advance(1);

            if let Some(state) = state.as_deref_mut() {
                state.ctor_dtor_conversion = true;
            }
            if inheriting {
                self.parse_name(state)?;
            }

            let name = self.make(Node::CtorDtorName {
                base: prefix,
                is_dtor: false,
            });
            return Ok((prefix, name));
        }

        if self.look() == b'D' && matches!(self.look_at(1), b'0' | b'1' | b'2' | b'4' | b'5') {
            self.advance(2);
            if let Some(state) = state {
                state.ctor_dtor_conversion = true;
            }

            let name = self.make(Node::CtorDtorName {
                base: prefix,
                is_dtor: true,
            });
            return Ok((prefix, name));
        }

        Err(self.error_here())
    }

    /// ```text
    /// <local-name> := Z <function encoding> E <entity name> [<discriminator>]
    ///              := Z <function encoding> E s [<discriminator>]
    ///              := Z <function encoding> Ed [ <parameter number> ] _ <entity name>
    /// ```
    fn parse_local_name(&mut self, state: Option<&mut NameState>) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        self.expect(b"Z")?;
        let encoding = self.parse_encoding()?;
        self.expect(b"E")?;

        if self.consume_if(b"s") {
            self.skip_discriminator();
            let entity = self.name("string literal");
            return Ok(self.make(Node::LocalName { encoding, entity }));
        }

        if self.consume_if(b"d") {
            self.parse_number(true);
            self.expect(b"_")?;
            let entity = self.parse_name(state)?;
            return Ok(self.make(Node::LocalName { encoding, entity }));
        }

        let entity = self.parse_name(state)?;
        self.skip_discriminator();
        Ok(self.make(Node::LocalName { encoding, entity }))
    }

    /// ```text
    /// <operator-name> ::= <two-letter code>
    ///                 ::= cv <type>          # (cast)
    ///                 ::= li <source-name>   # operator ""
    ///                 ::= v <digit> <source-name>
    /// ```
    fn parse_operator_name(&mut self, state: Option<&mut NameState>) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        if let Some(op) = find_operator(self.input.as_ref()) {
            self.advance(2);

            if op.kind == OpKind::CCast {
                // `operator T<int>` is ambiguous without this: the args belong
                // to the enclosing name, and `T_` may refer to them.
                let saved_template = mem::replace(&mut self.try_to_parse_template_args, false);
                let saved_permit = self.permit_forward_template_refs;
                self.permit_forward_template_refs = saved_permit || state.is_some();
                let ty = self.parse_type();
                self.try_to_parse_template_args = saved_template;
                self.permit_forward_template_refs = saved_permit;
                let ty = ty?;

                if let Some(state) = state {
                    state.ctor_dtor_conversion = true;
                }
                return Ok(self.make(Node::ConversionOperator(ty)));
            }

            return match op.name {
                Some(name) => Ok(self.name(name)),
                None => Err(Error::UnexpectedText),
            };
        }

        if self.consume_if(b"li") {
            let name = self.parse_source_name()?;
            return Ok(self.make(Node::LiteralOperator(name)));
        }

        if self.look() == b'v' && self.look_at(1).is_ascii_digit() {
            self.advance(2);
            let name = self.parse_source_name()?;
            return Ok(self.make(Node::ConversionOperator(name)));
        }

        Err(self.error_here())
    }

    /// ```text
    /// <substitution> ::= S_
    ///                ::= S <seq-id> _
    ///                ::= Sa | Sb | Ss | Si | So | Sd
    /// ```
    fn parse_substitution(&mut self) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        self.expect(b"S")?;

        if self.look().is_ascii_lowercase() {
            let kind = SpecialSub::from_code(self.look()).ok_or(Error::UnexpectedText)?;
            self.advance(1);

            let sub = self.make(Node::SpecialSubstitution(kind));
            let tagged = self.parse_abi_tags(sub)?;
            if tagged != sub {
                self.ws.subs.insert(tagged)?;
            }
            return Ok(tagged);
        }

        if self.consume_if(b"_") {
            return self.ws.subs.get(0);
        }

        let idx = self
            .parse_seq_id()?
            .checked_add(1)
            .ok_or(Error::Overflow)?;
        self.expect(b"_")?;
        self.ws.subs.get(idx)
    }

    // ---- templates ----

    /// ```text
    /// <template-param> ::= T_
    ///                  ::= T <parameter-2 non-negative number> _
    ///                  ::= TL <level-1> __
    ///                  ::= TL <level-1> _ <parameter-2 non-negative number> _
    /// ```
    fn parse_template_param(&mut self) -> Result<NodeId> {
        self.expect(b"T")?;

        let mut level = 0;
        if self.consume_if(b"L") {
            level = self.parse_positive_integer()?.checked_add(1).ok_or(Error::Overflow)?;
            self.expect(b"_")?;
        }

        let index = if self.consume_if(b"_") {
            0
        } else {
            let index = self.parse_positive_integer()?.checked_add(1).ok_or(Error::Overflow)?;
            self.expect(b"_")?;
            index
        };

        // `operator T_()` may refer to arguments that follow the operator name
        if self.permit_forward_template_refs && level == 0 {
            let node = self.make(Node::ForwardTemplateRef {
                index,
                target: None,
            });
            self.ws.forward_refs.push(node);
            return Ok(node);
        }

        let target = match self.ws.scopes.levels.get(level) {
            Some(Scope::Outer) => self.ws.scopes.outer.get(index).copied(),
            _ => None,
        };
        if let Some(target) = target {
            return Ok(self.make(Node::TemplateParam(target)));
        }

        // generic lambdas refer to their invented parameters before any
        // template argument list exists
        let depth = self.ws.scopes.levels.len();
        if self.parsing_lambda_params_at_level == Some(level) && level <= depth {
            if level == depth {
                self.ws.scopes.levels.push(Scope::Unbound);
            }
            return Ok(self.name("auto"));
        }

        Err(Error::BadTemplateArgReference)
    }

    /// `<template-args> ::= I <template-arg>+ E`
    ///
    /// With `tag` set these are the arguments of the name being encoded, which
    /// later `T_` references resolve against.
    fn parse_template_args(&mut self, tag: bool) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        self.expect(b"I")?;

        if tag {
            self.ws.scopes.clear();
            self.ws.scopes.levels.push(Scope::Outer);
        }

        let mut args = Vec::new();
        while !self.consume_if(b"E") {
            if tag {
                let saved_levels = mem::take(&mut self.ws.scopes.levels);
                let arg = self.parse_template_arg();
                self.ws.scopes.levels = saved_levels;
                let arg = arg?;

                let entry = match self.node(arg) {
                    Node::TemplateArgumentPack(elems) => self.make(Node::ParameterPack(elems)),
                    _ => arg,
                };
                self.ws.scopes.outer.push(entry);
                args.push(arg);
            } else {
                args.push(self.parse_template_arg()?);
            }
        }

        let args = self.list(&args);
        Ok(self.make(Node::TemplateArgs(args)))
    }

    /// ```text
    /// <template-arg> ::= <type>
    ///                ::= X <expression> E
    ///                ::= <expr-primary>
    ///                ::= J <template-arg>* E   # argument pack
    ///                ::= LZ <encoding> E
    /// ```
    fn parse_template_arg(&mut self) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        match self.look() {
            b'X' => {
                self.advance(1);
                let expr = self.parse_expr()?;
                self.expect(b"E")?;
                Ok(expr)
            }
            b'J' => {
                self.advance(1);
                let mut args = Vec::new();
                while !self.consume_if(b"E") {
                    args.push(self.parse_template_arg()?);
                }
                let args = self.list(&args);
                Ok(self.make(Node::TemplateArgumentPack(args)))
            }
            b'L' if self.look_at(1) == b'Z' => {
                self.advance(2);
                let encoding = self.parse_encoding()?;
                self.expect(b"E")?;
                Ok(encoding)
            }
            b'L' => self.parse_expr_primary(),
            _ => self.parse_type(),
        }
    }

    // ---- types ----

    /// ```text
    /// <type> ::= <builtin-type>
    ///        ::= <qualified-type>
    ///        ::= <function-type>
    ///        ::= <class-enum-type>
    ///        ::= <array-type>
    ///        ::= <pointer-to-member-type>
    ///        ::= <template-param>
    ///        ::= <template-template-param> <template-args>
    ///        ::= <decltype>
    ///        ::= P <type> | R <type> | O <type> | C <type> | G <type>
    ///        ::= Dp <type>
    ///        ::= <substitution>
    /// ```
    pub(crate) fn parse_type(&mut self) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        let look = self.look();

        if let Some(builtin) = builtin_type(look) {
            self.advance(1);
            return Ok(self.name(builtin));
        }

        let result = match look {
            b'r' | b'V' | b'K' => {
                // a qualified function type is a function type, and the
                // qualifiers belong to its `this`
                let mut after = 0;
                while matches!(self.look_at(after), b'r' | b'V' | b'K') {
                    after += 1;
                }
                let is_function = self.look_at(after) == b'F'
                    || (self.look_at(after) == b'D'
                        && matches!(self.look_at(after + 1), b'o' | b'O' | b'w' | b'x'));

                if is_function {
                    self.parse_function_type()?
                } else {
                    self.parse_qualified_type()?
                }
            }
            b'U' => self.parse_qualified_type()?,
            b'u' => {
                self.advance(1);
                let name = self.parse_bare_source_name()?;
                self.make(Node::Name(name))
            }
            b'D' => match self.look_at(1) {
                b'F' => {
                    // <builtin-type> ::= DF <number> _   # ISO/IEC TS 18661 binary floating point
                    self.advance(2);
                    let width = self.parse_number(false);
                    if width.is_empty() {
                        return Err(self.error_here());
                    }
                    self.expect(b"_")?;
                    self.make(Node::BinaryFloat(width))
                }
                b't' | b'T' => self.parse_decltype()?,
                b'p' => {
                    self.advance(2);
                    let child = self.parse_type()?;
                    self.make(Node::PackExpansion(child))
                }
                b'v' => self.parse_vector_type()?,
                b'o' | b'O' | b'w' | b'x' => self.parse_function_type()?,
                code => {
                    let builtin = extended_builtin_type(code).ok_or_else(|| self.error_here())?;
                    self.advance(2);
                    return Ok(self.name(builtin));
                }
            },
            b'F' => self.parse_function_type()?,
            b'A' => self.parse_array_type()?,
            b'M' => self.parse_pointer_to_member_type()?,
            b'T' => {
                if matches!(self.look_at(1), b's' | b'u' | b'e') {
                    self.parse_class_enum_type()?
                } else {
                    let param = self.parse_template_param()?;
                    if self.try_to_parse_template_args && self.look() == b'I' {
                        self.ws.subs.insert(param)?;
                        let args = self.parse_template_args(false)?;
                        self.make(Node::NameWithTemplateArgs { name: param, args })
                    } else {
                        param
                    }
                }
            }
            b'P' => {
                self.advance(1);
                let pointee = self.parse_type()?;
                self.make(Node::Pointer(pointee))
            }
            b'R' | b'O' => {
                self.advance(1);
                let kind = if look == b'R' {
                    RefKind::LValue
                } else {
                    RefKind::RValue
                };
                let pointee = self.parse_type()?;
                self.make(Node::Reference { pointee, kind })
            }
            b'C' => {
                self.advance(1);
                let child = self.parse_type()?;
                self.make(Node::PostfixQualifiedType {
                    child,
                    postfix: " complex",
                })
            }
            b'G' => {
                self.advance(1);
                let child = self.parse_type()?;
                self.make(Node::PostfixQualifiedType {
                    child,
                    postfix: " imaginary",
                })
            }
            b'S' if self.look_at(1) != b't' => {
                let sub = self.parse_substitution()?;

                // <template-template-param> <template-args>
                if self.try_to_parse_template_args && self.look() == b'I' {
                    let args = self.parse_template_args(false)?;
                    self.make(Node::NameWithTemplateArgs { name: sub, args })
                } else {
                    return Ok(sub);
                }
            }
            _ => self.parse_class_enum_type()?,
        };

        self.ws.subs.insert(result)?;
        Ok(result)
    }

    /// `<CV-qualifiers> ::= [r] [V] [K]`
    fn parse_cv_qualifiers(&mut self) -> Qualifiers {
        let mut quals = Qualifiers::empty();
        if self.consume_if(b"r") {
            quals |= Qualifiers::RESTRICT;
        }
        if self.consume_if(b"V") {
            quals |= Qualifiers::VOLATILE;
        }
        if self.consume_if(b"K") {
            quals |= Qualifiers::CONST;
        }
        quals
    }

    /// ```text
    /// <qualified-type> ::= <qualifiers> <type>
    /// <qualifiers>     ::= <extended-qualifier>* <CV-qualifiers>
    /// <extended-qualifier> ::= U <source-name>
    /// ```
    fn parse_qualified_type(&mut self) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        if self.consume_if(b"U") {
            let ext = self.parse_bare_source_name()?;
            let child = self.parse_qualified_type()?;
            return Ok(self.make(Node::VendorExtQualType { child, ext }));
        }

        let quals = self.parse_cv_qualifiers();
        let child = self.parse_type()?;

        if quals.is_empty() {
            Ok(child)
        } else {
            Ok(self.make(Node::QualType { child, quals }))
        }
    }

    /// ```text
    /// <function-type>      ::= [<CV-qualifiers>] [<exception-spec>] [Dx] F [Y] <bare-function-type> [<ref-qualifier>] E
    /// <exception-spec>     ::= Do | DO <expression> E | Dw <type>+ E
    /// ```
    fn parse_function_type(&mut self) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        let cv = self.parse_cv_qualifiers();

        let mut exception = None;
        if self.consume_if(b"Do") {
            exception = Some(self.name("noexcept"));
        } else if self.consume_if(b"DO") {
            let expr = self.parse_expr()?;
            self.expect(b"E")?;
            exception = Some(self.make(Node::NoexceptSpec(expr)));
        } else if self.consume_if(b"Dw") {
            let mut types = Vec::new();
            while !self.consume_if(b"E") {
                types.push(self.parse_type()?);
            }
            let types = self.list(&types);
            exception = Some(self.make(Node::DynamicExceptionSpec(types)));
        }

        // transaction-safe, not rendered
        self.consume_if(b"Dx");

        self.expect(b"F")?;
        // extern "C", not rendered
        self.consume_if(b"Y");

        let ret = self.parse_type()?;

        let mut params = Vec::new();
        let mut ref_qual = RefQualifier::None;
        loop {
            if self.consume_if(b"E") {
                break;
            }
            if self.consume_if(b"v") {
                continue;
            }
            if self.consume_if(b"RE") {
                ref_qual = RefQualifier::LValue;
                break;
            }
            if self.consume_if(b"OE") {
                ref_qual = RefQualifier::RValue;
                break;
            }
            params.push(self.parse_type()?);
        }

        let params = self.list(&params);
        Ok(self.make(Node::Function {
            ret,
            params,
            cv,
            ref_qual,
            exception,
        }))
    }

    /// ```text
    /// <array-type> ::= A <positive dimension number> _ <element type>
    ///              ::= A [<dimension expression>] _ <element type>
    /// ```
    fn parse_array_type(&mut self) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        self.expect(b"A")?;

        let dimension = if self.look().is_ascii_digit() {
            let number = self.parse_number(false);
            self.expect(b"_")?;
            Some(self.make(Node::Name(number)))
        } else if self.consume_if(b"_") {
            None
        } else {
            let expr = self.parse_expr()?;
            self.expect(b"_")?;
            Some(expr)
        };

        let base = self.parse_type()?;
        Ok(self.make(Node::Array { base, dimension }))
    }

    /// `<pointer-to-member-type> ::= M <class type> <member type>`
    fn parse_pointer_to_member_type(&mut self) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        self.expect(b"M")?;
        let class = self.parse_type()?;
        let member = self.parse_type()?;
        Ok(self.make(Node::PointerToMember { class, member }))
    }

    /// ```text
    /// <class-enum-type> ::= <name>
    ///                   ::= Ts <name>   # struct or class
    ///                   ::= Tu <name>   # union
    ///                   ::= Te <name>   # enum
    /// ```
    fn parse_class_enum_type(&mut self) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        let kind = if self.consume_if(b"Ts") {
            Some("struct")
        } else if self.consume_if(b"Tu") {
            Some("union")
        } else if self.consume_if(b"Te") {
            Some("enum")
        } else {
            None
        };

        let name = self.parse_name(None)?;
        match kind {
            Some(kind) => Ok(self.make(Node::ElaboratedType { kind, child: name })),
            None => Ok(name),
        }
    }

    /// ```text
    /// <decltype> ::= Dt <expression> E   # decltype of an id-expression or class member access
    ///            ::= DT <expression> E   # decltype of an expression
    /// ```
    fn parse_decltype(&mut self) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        if !(self.consume_if(b"Dt") || self.consume_if(b"DT")) {
            return Err(self.error_here());
        }

        let inner = self.parse_expr()?;
        self.expect(b"E")?;
        Ok(self.make(Node::Enclosing {
            prefix: "decltype",
            inner,
        }))
    }

    /// ```text
    /// <vector-type>       ::= Dv <positive dimension number> _ <extended element type>
    ///                     ::= Dv [<dimension expression>] _ <element type>
    /// <extended element type> ::= <element type>
    ///                         ::= p   # AltiVec vector pixel
    /// ```
    fn parse_vector_type(&mut self) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        self.expect(b"Dv")?;

        if matches!(self.look(), b'1'..=b'9') {
            let number = self.parse_number(false);
            let dimension = self.make(Node::Name(number));
            self.expect(b"_")?;

            if self.consume_if(b"p") {
                return Ok(self.make(Node::PixelVector(dimension)));
            }

            let base = self.parse_type()?;
            return Ok(self.make(Node::Vector {
                base,
                dimension: Some(dimension),
            }));
        }

        let dimension = if self.consume_if(b"_") {
            None
        } else {
            let expr = self.parse_expr()?;
            self.expect(b"_")?;
            Some(expr)
        };

        let base = self.parse_type()?;
        Ok(self.make(Node::Vector { base, dimension }))
    }

    // ---- expressions ----

    /// ```text
    /// <expression> ::= <unary operator-name> <expression>
    ///              ::= <binary operator-name> <expression> <expression>
    ///              ::= <ternary operator-name> <expression> <expression> <expression>
    ///              ::= pp_ <expression> | mm_ <expression>
    ///              ::= cl <expression>+ E
    ///              ::= cv <type> <expression> | cv <type> _ <expression>* E
    ///              ::= [gs] nw <expression>* _ <type> [pi <expression>*] E
    ///              ::= [gs] dl <expression> | [gs] da <expression>
    ///              ::= dc | sc | cc | rc <type> <expression>
    ///              ::= ti <type> | te <expression> | st <type> | sz <expression>
    ///              ::= tw <expression> | tr
    ///              ::= il <braced-init>* E | tl <type> <braced-init>* E
    ///              ::= sZ <template-param> | sZ <function-param> | sP <template-arg>* E
    ///              ::= sp <expression> | nx <expression>
    ///              ::= <template-param> | <function-param> | <unresolved-name> | <expr-primary>
    /// ```
    fn parse_expr(&mut self) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        let global = self.consume_if(b"gs");
        if self.input.len() < 2 {
            return Err(Error::UnexpectedEnd);
        }

        match self.look() {
            b'L' => return self.parse_expr_primary(),
            b'T' => return self.parse_template_param(),
            b'f' => {
                if self.look_at(1) == b'p'
                    || (self.look_at(1) == b'L' && self.look_at(2).is_ascii_digit())
                {
                    return self.parse_function_param();
                }
                return self.parse_fold_expr();
            }
            _ => {}
        }

        if let Some(op) = find_operator(self.input.as_ref()) {
            self.advance(2);

            return match op.kind {
                OpKind::Binary => {
                    let lhs = self.parse_expr()?;
                    let rhs = self.parse_expr()?;
                    Ok(self.make(Node::Binary {
                        lhs,
                        op: op.symbol,
                        rhs,
                    }))
                }
                OpKind::Prefix => {
                    let child = self.parse_expr()?;
                    Ok(self.make(Node::Prefix {
                        op: op.symbol,
                        child,
                    }))
                }
                OpKind::Postfix => {
                    if self.consume_if(b"_") {
                        let child = self.parse_expr()?;
                        return Ok(self.make(Node::Prefix {
                            op: op.symbol,
                            child,
                        }));
                    }
                    let child = self.parse_expr()?;
                    Ok(self.make(Node::Postfix {
                        child,
                        op: op.symbol,
                    }))
                }
                OpKind::Array => {
                    let base = self.parse_expr()?;
                    let index = self.parse_expr()?;
                    Ok(self.make(Node::Subscript { base, index }))
                }
                OpKind::Member => {
                    let lhs = self.parse_expr()?;
                    let rhs = self.parse_expr()?;
                    Ok(self.make(Node::Member {
                        lhs,
                        op: op.symbol,
                        rhs,
                    }))
                }
                OpKind::New => self.parse_new_expr(global, op.flag),
                OpKind::Delete => {
                    let child = self.parse_expr()?;
                    Ok(self.make(Node::Delete {
                        child,
                        global,
                        array: op.flag,
                    }))
                }
                OpKind::Call => {
                    let callee = self.parse_expr()?;
                    let mut args = Vec::new();
                    while !self.consume_if(b"E") {
                        args.push(self.parse_expr()?);
                    }
                    let args = self.list(&args);
                    Ok(self.make(Node::Call { callee, args }))
                }
                OpKind::CCast => self.parse_conversion_expr(),
                OpKind::Conditional => {
                    let cond = self.parse_expr()?;
                    let then = self.parse_expr()?;
                    let otherwise = self.parse_expr()?;
                    Ok(self.make(Node::Conditional {
                        cond,
                        then,
                        otherwise,
                    }))
                }
                OpKind::NamedCast => {
                    let to = self.parse_type()?;
                    let from = self.parse_expr()?;
                    Ok(self.make(Node::NamedCast {
                        kind: op.symbol,
                        to,
                        from,
                    }))
                }
                OpKind::OfType => {
                    let inner = self.parse_type()?;
                    Ok(self.make(Node::Enclosing {
                        prefix: op.symbol,
                        inner,
                    }))
                }
                OpKind::OfExpr => {
                    let inner = self.parse_expr()?;
                    Ok(self.make(Node::Enclosing {
                        prefix: op.symbol,
                        inner,
                    }))
                }
            };
        }

        match (self.look(), self.look_at(1)) {
            (b'i', b'l') => {
                self.advance(2);
                let inits = self.parse_braced_list()?;
                Ok(self.make(Node::InitList { ty: None, inits }))
            }
            (b't', b'l') => {
                self.advance(2);
                let ty = self.parse_type()?;
                let inits = self.parse_braced_list()?;
                Ok(self.make(Node::InitList {
                    ty: Some(ty),
                    inits,
                }))
            }
            (b't', b'w') => {
                self.advance(2);
                let child = self.parse_expr()?;
                Ok(self.make(Node::Throw(child)))
            }
            (b't', b'r') => {
                self.advance(2);
                Ok(self.name("throw"))
            }
            (b'n', b'x') => {
                self.advance(2);
                let inner = self.parse_expr()?;
                Ok(self.make(Node::Enclosing {
                    prefix: "noexcept ",
                    inner,
                }))
            }
            (b's', b'p') => {
                self.advance(2);
                let child = self.parse_expr()?;
                Ok(self.make(Node::PackExpansion(child)))
            }
            (b's', b'Z') => {
                self.advance(2);
                if self.look() == b'T' {
                    let pack = self.parse_template_param()?;
                    return Ok(self.make(Node::SizeofPack(pack)));
                }
                if self.look() == b'f' {
                    let param = self.parse_function_param()?;
                    return Ok(self.make(Node::Enclosing {
                        prefix: "sizeof... ",
                        inner: param,
                    }));
                }
                Err(self.error_here())
            }
            (b's', b'P') => {
                self.advance(2);
                let mut args = Vec::new();
                while !self.consume_if(b"E") {
                    args.push(self.parse_template_arg()?);
                }
                let args = self.list(&args);
                let pack = self.make(Node::NodeList(args));
                Ok(self.make(Node::Enclosing {
                    prefix: "sizeof... ",
                    inner: pack,
                }))
            }
            _ => self.parse_unresolved_name(global),
        }
    }

    /// `[gs] nw <expression>* _ <type> [pi <expression>*] E`
    fn parse_new_expr(&mut self, global: bool, array: bool) -> Result<NodeId> {
        let mut exprs = Vec::new();
        while !self.consume_if(b"_") {
            exprs.push(self.parse_expr()?);
        }

        let ty = self.parse_type()?;

        let mut inits = Vec::new();
        if self.consume_if(b"pi") {
            while !self.consume_if(b"E") {
                inits.push(self.parse_expr()?);
            }
        } else {
            self.expect(b"E")?;
        }

        let exprs = self.list(&exprs);
        let inits = self.list(&inits);
        Ok(self.make(Node::New {
            exprs,
            ty,
            inits,
            global,
            array,
        }))
    }

    /// `cv <type> <expression>` or `cv <type> _ <expression>* E`
    fn parse_conversion_expr(&mut self) -> Result<NodeId> {
        let saved = mem::replace(&mut self.try_to_parse_template_args, false);
        let ty = self.parse_type();
        self.try_to_parse_template_args = saved;
        let ty = ty?;

        let mut exprs = Vec::new();
        if self.consume_if(b"_") {
            while !self.consume_if(b"E") {
                exprs.push(self.parse_expr()?);
            }
        } else {
            exprs.push(self.parse_expr()?);
        }

        let exprs = self.list(&exprs);
        Ok(self.make(Node::Conversion { ty, exprs }))
    }

    fn parse_braced_list(&mut self) -> Result<NodeArray> {
        let mut inits = Vec::new();
        while !self.consume_if(b"E") {
            inits.push(self.parse_braced_expr()?);
        }
        Ok(self.list(&inits))
    }

    /// ```text
    /// <braced-expression> ::= <expression>
    ///                     ::= di <field source-name> <braced-expression>
    ///                     ::= dx <index expression> <braced-expression>
    ///                     ::= dX <range begin expression> <range end expression> <braced-expression>
    /// ```
    fn parse_braced_expr(&mut self) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        if self.look() == b'd' {
            match self.look_at(1) {
                b'i' => {
                    self.advance(2);
                    let elem = self.parse_source_name()?;
                    let init = self.parse_braced_expr()?;
                    return Ok(self.make(Node::Braced {
                        elem,
                        init,
                        array: false,
                    }));
                }
                b'x' => {
                    self.advance(2);
                    let elem = self.parse_expr()?;
                    let init = self.parse_braced_expr()?;
                    return Ok(self.make(Node::Braced {
                        elem,
                        init,
                        array: true,
                    }));
                }
                b'X' => {
                    self.advance(2);
                    let first = self.parse_expr()?;
                    let last = self.parse_expr()?;
                    let init = self.parse_braced_expr()?;
                    return Ok(self.make(Node::BracedRange { first, last, init }));
                }
                _ => {}
            }
        }

        self.parse_expr()
    }

    /// ```text
    /// <function-param> ::= fp <top-level CV-qualifiers> _
    ///                  ::= fp <top-level CV-qualifiers> <parameter-2 non-negative number> _
    ///                  ::= fL <L-1 non-negative number> p <top-level CV-qualifiers> _
    ///                  ::= fL <L-1 non-negative number> p <top-level CV-qualifiers> <parameter-2 non-negative number> _
    ///                  ::= fpT   # 'this'
    /// ```
    fn parse_function_param(&mut self) -> Result<NodeId> {
        if self.consume_if(b"fpT") {
            return Ok(self.name("this"));
        }

        if self.consume_if(b"fp") {
            self.parse_cv_qualifiers();
            let number = self.parse_number(false);
            self.expect(b"_")?;
            return Ok(self.make(Node::FunctionParam(number)));
        }

        if self.consume_if(b"fL") {
            if self.parse_number(false).is_empty() {
                return Err(self.error_here());
            }
            self.expect(b"p")?;
            self.parse_cv_qualifiers();
            let number = self.parse_number(false);
            self.expect(b"_")?;
            return Ok(self.make(Node::FunctionParam(number)));
        }

        Err(self.error_here())
    }

    /// ```text
    /// <fold-expression> ::= fl <binary operator-name> <expression>
    ///                   ::= fr <binary operator-name> <expression>
    ///                   ::= fL <binary operator-name> <expression> <expression>
    ///                   ::= fR <binary operator-name> <expression> <expression>
    /// ```
    fn parse_fold_expr(&mut self) -> Result<NodeId> {
        self.expect(b"f")?;

        let (left, has_init) = match self.look() {
            b'l' => (true, false),
            b'r' => (false, false),
            b'L' => (true, true),
            b'R' => (false, true),
            _ => return Err(self.error_here()),
        };
        self.advance(1);

        let op = find_operator(self.input.as_ref()).ok_or_else(|| self.error_here())?;
        let foldable = match op.kind {
            OpKind::Binary => true,
            OpKind::Member => op.symbol.ends_with('*'),
            _ => false,
        };
        if !foldable {
            return Err(Error::UnexpectedText);
        }
        self.advance(2);

        let mut pack = self.parse_expr()?;
        let mut init = if has_init {
            Some(self.parse_expr()?)
        } else {
            None
        };

        // `fL` mangles the initializer before the pack
        if let (true, Some(first)) = (left, init) {
            init = Some(pack);
            pack = first;
        }

        Ok(self.make(Node::Fold {
            left,
            op: op.symbol,
            pack,
            init,
        }))
    }

    /// ```text
    /// <expr-primary> ::= L <type> <value number> E
    ///                ::= L <type> <value float> E
    ///                ::= L <string type> E
    ///                ::= L <nullptr type> E
    ///                ::= L <pointer type> 0 E
    ///                ::= L <mangled-name> E
    ///                ::= L <lambda type> E
    /// ```
    fn parse_expr_primary(&mut self) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        self.expect(b"L")?;

        let code = self.look();
        if let Some(ty) = integer_literal_type(code) {
            self.advance(1);
            return self.parse_integer_literal(ty);
        }

        match code {
            b'b' => {
                let value = if self.consume_if(b"b0E") {
                    false
                } else if self.consume_if(b"b1E") {
                    true
                } else {
                    return Err(self.error_here());
                };
                Ok(self.make(Node::BoolLiteral(value)))
            }
            b'f' | b'd' | b'e' => {
                let kind = FloatKind::from_code(code).ok_or(Error::UnexpectedText)?;
                self.advance(1);
                self.parse_float_literal(kind)
            }
            b'_' => {
                if !self.consume_if(b"_Z") {
                    return Err(self.error_here());
                }
                let encoding = self.parse_encoding()?;
                self.expect(b"E")?;
                Ok(encoding)
            }
            b'A' => {
                let ty = self.parse_type()?;
                self.expect(b"E")?;
                Ok(self.make(Node::StringLiteral(ty)))
            }
            b'D' if self.consume_if(b"DnE") => Ok(self.name("nullptr")),
            b'D' if self.consume_if(b"Dn0E") => Ok(self.name("nullptr")),
            b'T' => Err(Error::UnexpectedText),
            b'U' if self.look_at(1) == b'l' => {
                let ty = self.parse_unnamed_type_name()?;
                self.expect(b"E")?;
                Ok(self.make(Node::LambdaLiteral(ty)))
            }
            _ => {
                let ty = self.parse_type()?;
                let value = self.parse_number(true);
                if value.is_empty() {
                    return Err(self.error_here());
                }
                self.expect(b"E")?;
                Ok(self.make(Node::EnumLiteral { ty, value }))
            }
        }
    }

    /// `<value float>`: the bit pattern as lower-case hex digits, most
    /// significant first.
    fn parse_float_literal(&mut self, kind: FloatKind) -> Result<NodeId> {
        let (head, tail) = self
            .input
            .try_split_at(kind.digits())
            .ok_or(Error::UnexpectedEnd)?;

        let is_hex = |b: &u8| matches!(b, b'0'..=b'9' | b'a'..=b'f');
        if !head.as_ref().iter().all(is_hex) {
            return Err(Error::UnexpectedText);
        }

        self.input = tail;
        self.expect(b"E")?;

        let bits = Text::Input {
            start: head.index(),
            end: head.index() + kind.digits(),
        };
        Ok(self.make(Node::FloatLiteral { kind, bits }))
    }

        fn parse_integer_literal(&mut self, ty: &'static str) -> Result<NodeId> {
        let value = self.parse_number(true);
        if value.is_empty() {
            return Err(self.error_here());
        }
        self.expect(b"E")?;
        Ok(self.make(Node::IntegerLiteral { ty, value }))
    }

    /// ```text
    /// <unresolved-name> ::= [gs] <base-unresolved-name>
    ///                   ::= sr <unresolved-type> <base-unresolved-name>
    ///                   ::= srN <unresolved-type> <unresolved-qualifier-level>+ E <base-unresolved-name>
    ///                   ::= [gs] sr <unresolved-qualifier-level>+ E <base-unresolved-name>
    /// ```
    fn parse_unresolved_name(&mut self, global: bool) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        if self.consume_if(b"srN") {
            let mut so_far = self.parse_unresolved_type()?;

            if self.look() == b'I' {
                let args = self.parse_template_args(false)?;
                so_far = self.make(Node::NameWithTemplateArgs {
                    name: so_far,
                    args,
                });
            }

            while !self.consume_if(b"E") {
                let qual = self.parse_simple_id()?;
                so_far = self.make(Node::QualifiedName {
                    qualifier: so_far,
                    name: qual,
                });
            }

            let base = self.parse_base_unresolved_name()?;
            return Ok(self.make(Node::QualifiedName {
                qualifier: so_far,
                name: base,
            }));
        }

        if !self.consume_if(b"sr") {
            let base = self.parse_base_unresolved_name()?;
            if global {
                return Ok(self.make(Node::GlobalQualifiedName(base)));
            }
            return Ok(base);
        }

        let so_far = if self.look().is_ascii_digit() {
            let mut so_far: Option<NodeId> = None;
            loop {
                let qual = self.parse_simple_id()?;
                so_far = Some(match so_far {
                    Some(qualifier) => self.make(Node::QualifiedName {
                        qualifier,
                        name: qual,
                    }),
                    None if global => self.make(Node::GlobalQualifiedName(qual)),
                    None => qual,
                });

                if self.consume_if(b"E") {
                    break;
                }
            }
            so_far.ok_or(Error::UnexpectedText)?
        } else {
            let ty = self.parse_unresolved_type()?;
            if self.look() == b'I' {
                let args = self.parse_template_args(false)?;
                self.make(Node::NameWithTemplateArgs { name: ty, args })
            } else {
                ty
            }
        };

        let base = self.parse_base_unresolved_name()?;
        Ok(self.make(Node::QualifiedName {
            qualifier: so_far,
            name: base,
        }))
    }

    /// ```text
    /// <unresolved-type> ::= <template-param>
    ///                   ::= <decltype>
    ///                   ::= <substitution>
    /// ```
    fn parse_unresolved_type(&mut self) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        match self.look() {
            b'T' => {
                let param = self.parse_template_param()?;
                self.ws.subs.insert(param)?;
                Ok(param)
            }
            b'D' => {
                let decltype = self.parse_decltype()?;
                self.ws.subs.insert(decltype)?;
                Ok(decltype)
            }
            _ => self.parse_substitution(),
        }
    }

    /// `<simple-id> ::= <source-name> [<template-args>]`
    fn parse_simple_id(&mut self) -> Result<NodeId> {
        let name = self.parse_source_name()?;
        if self.look() == b'I' {
            let args = self.parse_template_args(false)?;
            return Ok(self.make(Node::NameWithTemplateArgs { name, args }));
        }
        Ok(name)
    }

    /// ```text
    /// <base-unresolved-name> ::= <simple-id>
    ///                        ::= on <operator-name> [<template-args>]
    ///                        ::= dn <destructor-name>
    /// ```
    fn parse_base_unresolved_name(&mut self) -> Result<NodeId> {
        let ctx = self.ctx;
        try_begin_parse!(ctx);

        if self.look().is_ascii_digit() {
            return self.parse_simple_id();
        }

        if self.consume_if(b"dn") {
            return self.parse_destructor_name();
        }

        self.consume_if(b"on");

        let op = self.parse_operator_name(None)?;
        if self.look() == b'I' {
            let args = self.parse_template_args(false)?;
            return Ok(self.make(Node::NameWithTemplateArgs { name: op, args }));
        }
        Ok(op)
    }

    /// ```text
    /// <destructor-name> ::= <unresolved-type>
    ///                   ::= <simple-id>
    /// ```
    fn parse_destructor_name(&mut self) -> Result<NodeId> {
        let name = if self.look().is_ascii_digit() {
            self.parse_simple_id()?
        } else {
            self.parse_unresolved_type()?
        };
        Ok(self.make(Node::DtorName(name)))
    }
}
