//! Turns a parsed tree back into C++ source syntax.
//!
//! Declarator syntax wraps around its name (`void (*)(int)`), so every node is
//! printed in two halves: [`Renderer::print_left`] emits what goes before the
//! name, [`Renderer::print_right`] what goes after it.

use super::arena::{Arena, NodeArray, NodeId};
use super::ast::{FloatKind, Node, Qualifiers, RefKind, RefQualifier, Text};
use super::error::{Error, Result};

/// Marks the pack state as not currently expanding a parameter pack.
const UNSET: usize = usize::MAX;

/// Upper bound on reference-collapsing and alias-following chains.
const MAX_CHAIN: usize = 128;

#[derive(Clone, Copy)]
enum Component {
    Rhs,
    Array,
    Function,
}

pub(crate) struct Renderer<'a> {
    input: &'a [u8],
    arena: &'a Arena<Node>,
    out: &'a mut Vec<u8>,
    pack_index: usize,
    pack_max: usize,
    depth: u32,
    max_depth: u32,
    max_len: usize,
}

impl<'a> Renderer<'a> {
    pub fn new(
        input: &'a [u8],
        arena: &'a Arena<Node>,
        out: &'a mut Vec<u8>,
        max_depth: u32,
        max_len: usize,
    ) -> Self {
        Renderer {
            input,
            arena,
            out,
            pack_index: UNSET,
            pack_max: UNSET,
            depth: 0,
            max_depth,
            max_len,
        }
    }

    #[inline]
    fn write(&mut self, s: &str) {
        self.out.extend_from_slice(s.as_bytes());
    }

    #[inline]
    fn write_text(&mut self, text: Text) {
        let input = self.input;
        self.out.extend_from_slice(text.resolve(input));
    }

    /// Write a literal's digits, turning the mangled `n` sign into `-`.
    fn write_number(&mut self, value: Text) {
        let input = self.input;
        match value.resolve(input) {
            [b'n', digits @ ..] => {
                self.out.push(b'-');
                self.out.extend_from_slice(digits);
            }
            digits => self.out.extend_from_slice(digits),
        }
    }

    #[inline]
    fn last_byte(&self) -> Option<u8> {
        self.out.last().copied()
    }

    fn enter(&mut self) -> Result<()> {
        if self.out.len() > self.max_len {
            return Err(Error::TooLong);
        }
        self.depth += 1;
        if self.depth >= self.max_depth {
            return Err(Error::TooMuchRecursion);
        }
        Ok(())
    }

    #[inline]
    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn print(&mut self, id: NodeId) -> Result<()> {
        self.print_left(id)?;
        self.print_right(id)
    }

    pub fn print_left(&mut self, id: NodeId) -> Result<()> {
        self.enter()?;
        let result = self.print_left_inner(id);
        self.leave();
        result
    }

    pub fn print_right(&mut self, id: NodeId) -> Result<()> {
        self.enter()?;
        let result = self.print_right_inner(id);
        self.leave();
        result
    }

    fn print_with_comma(&mut self, list: NodeArray) -> Result<()> {
        let arena = self.arena;
        let mut first = true;

        for &elem in arena.list(list) {
            let before_comma = self.out.len();
            if !first {
                self.write(", ");
            }
            let after_comma = self.out.len();

            self.print(elem)?;

            // an empty pack expansion prints nothing, so drop its comma too
            if after_comma == self.out.len() {
                self.out.truncate(before_comma);
                continue;
            }

            first = false;
        }

        Ok(())
    }

    fn print_quals(&mut self, quals: Qualifiers) {
        if quals.contains(Qualifiers::CONST) {
            self.write(" const");
        }
        if quals.contains(Qualifiers::VOLATILE) {
            self.write(" volatile");
        }
        if quals.contains(Qualifiers::RESTRICT) {
            self.write(" restrict");
        }
    }

    fn print_ref_qual(&mut self, ref_qual: RefQualifier) {
        match ref_qual {
            RefQualifier::None => {}
            RefQualifier::LValue => self.write(" &"),
            RefQualifier::RValue => self.write(" &&"),
        }
    }

    fn print_paren(&mut self, id: NodeId) -> Result<()> {
        self.write("(");
        self.print(id)?;
        self.write(")");
        Ok(())
    }

    fn print_closure_params(&mut self, id: NodeId) -> Result<()> {
        if let Node::ClosureType { params, .. } = self.arena[id] {
            self.write("(");
            self.print_with_comma(params)?;
            self.write(")");
        }
        Ok(())
    }

    /// Start iterating a parameter pack unless one is already being expanded.
    fn init_pack(&mut self, len: usize) {
        if self.pack_max == UNSET {
            self.pack_max = len;
            self.pack_index = 0;
        }
    }

    fn current_pack_elem(&mut self, list: NodeArray) -> Option<NodeId> {
        self.init_pack(list.len());
        self.arena.list(list).get(self.pack_index).copied()
    }

    /// Whether the type at `id` prints something after the declarator name, or
    /// is an array or function type.
    fn has(&mut self, id: NodeId, which: Component) -> bool {
        let mut id = id;

        for _ in 0..MAX_CHAIN {
            id = match (self.arena[id], which) {
                (Node::QualType { child, .. }, _) => child,
                (Node::TemplateParam(target), _) => target,
                (
                    Node::ForwardTemplateRef {
                        target: Some(target),
                        ..
                    },
                    _,
                ) => target,
                (Node::ParameterPack(list), _) => match self.current_pack_elem(list) {
                    Some(elem) => elem,
                    None => return false,
                },
                (Node::Pointer(pointee), Component::Rhs) => pointee,
                (Node::Reference { pointee, .. }, Component::Rhs) => pointee,
                (Node::PointerToMember { member, .. }, Component::Rhs) => member,
                (Node::Array { .. }, Component::Rhs | Component::Array) => return true,
                (
                    Node::Function { .. } | Node::FunctionEncoding { .. },
                    Component::Rhs | Component::Function,
                ) => return true,
                _ => return false,
            };
        }

        false
    }

    fn has_array_or_function(&mut self, id: NodeId) -> bool {
        self.has(id, Component::Array) || self.has(id, Component::Function)
    }

    /// Follow aliases to the node that determines how `id` is spelled.
    fn syntax_node(&mut self, id: NodeId) -> NodeId {
        let mut id = id;

        for _ in 0..MAX_CHAIN {
            id = match self.arena[id] {
                Node::TemplateParam(target) => target,
                Node::ForwardTemplateRef {
                    target: Some(target),
                    ..
                } => target,
                Node::ParameterPack(list) => match self.current_pack_elem(list) {
                    Some(elem) => elem,
                    None => return id,
                },
                _ => return id,
            };
        }

        id
    }

    /// Apply reference collapsing: `T& &&` is `T&`, `T&& &&` is `T&&`.
    fn collapse(&mut self, kind: RefKind, pointee: NodeId) -> Option<(RefKind, NodeId)> {
        let mut so_far = (kind, pointee);

        for _ in 0..MAX_CHAIN {
            let syntax = self.syntax_node(so_far.1);
            match self.arena[syntax] {
                Node::Reference { pointee, kind } => so_far = (so_far.0.min(kind), pointee),
                _ => return Some(so_far),
            }
        }

        None
    }

    /// Unqualified name used for constructors and destructors of `id`.
    fn base_name(&self, id: NodeId) -> Text {
        let mut id = id;

        for _ in 0..MAX_CHAIN {
            id = match self.arena[id] {
                Node::Name(text) => return text,
                Node::SpecialSubstitution(kind) | Node::ExpandedSpecialSubstitution(kind) => {
                    return Text::Static(kind.base_name())
                }
                Node::NestedName { name, .. } | Node::QualifiedName { name, .. } => name,
                Node::NameWithTemplateArgs { name, .. } => name,
                Node::StdQualifiedName(child) => child,
                Node::AbiTagAttr { base, .. } => base,
                Node::TemplateParam(target) => target,
                Node::ForwardTemplateRef {
                    target: Some(target),
                    ..
                } => target,
                _ => return Text::EMPTY,
            };
        }

        Text::EMPTY
    }

    fn print_pack_expansion(&mut self, child: NodeId) -> Result<()> {
        let saved = (self.pack_index, self.pack_max);
        self.pack_index = UNSET;
        self.pack_max = UNSET;

        let result = self.print_pack_expansion_inner(child);

        (self.pack_index, self.pack_max) = saved;
        result
    }

    fn print_pack_expansion_inner(&mut self, child: NodeId) -> Result<()> {
        let start = self.out.len();

        // prints the first element, and sets up the pack if `child` has one
        self.print(child)?;

        // no pack found, as in a pack expansion of a function parameter
        if self.pack_max == UNSET {
            self.write("...");
            return Ok(());
        }

        if self.pack_max == 0 {
            self.out.truncate(start);
            return Ok(());
        }

        for idx in 1..self.pack_max {
            self.write(", ");
            self.pack_index = idx;
            self.print(child)?;
        }

        Ok(())
    }

    fn print_fold_pack(&mut self, pack: NodeId) -> Result<()> {
        self.write("(");
        self.print_pack_expansion(pack)?;
        self.write(")");
        Ok(())
    }

    fn print_braced_init(&mut self, init: NodeId) -> Result<()> {
        if !matches!(
            self.arena[init],
            Node::Braced { .. } | Node::BracedRange { .. }
        ) {
            self.write(" = ");
        }
        self.print(init)
    }

    fn print_left_inner(&mut self, id: NodeId) -> Result<()> {
        match self.arena[id] {
            Node::Name(text) => self.write_text(text),
            Node::NestedName { qual, name } => {
                self.print(qual)?;
                self.write("::");
                self.print(name)?;
            }
            Node::LocalName { encoding, entity } => {
                self.print(encoding)?;
                self.write("::");
                self.print(entity)?;
            }
            Node::StdQualifiedName(child) => {
                self.write("std::");
                self.print(child)?;
            }
            Node::QualifiedName { qualifier, name } => {
                self.print(qualifier)?;
                self.write("::");
                self.print(name)?;
            }
            Node::GlobalQualifiedName(child) => {
                self.write("::");
                self.print(child)?;
            }
            Node::NameWithTemplateArgs { name, args } => {
                self.print(name)?;
                self.print(args)?;
            }
            Node::TemplateArgs(args) => {
                self.write("<");
                self.print_with_comma(args)?;
                if self.last_byte() == Some(b'>') {
                    self.write(" ");
                }
                self.write(">");
            }
            Node::AbiTagAttr { base, tag } => {
                self.print_left(base)?;
                self.write("[abi:");
                self.write_text(tag);
                self.write("]");
            }
            Node::CtorDtorName { base, is_dtor } => {
                if is_dtor {
                    self.write("~");
                }
                let name = self.base_name(base);
                self.write_text(name);
            }
            Node::DtorName(base) => {
                self.write("~");
                self.print_left(base)?;
            }
            Node::ConversionOperator(ty) => {
                self.write("operator ");
                self.print(ty)?;
            }
            Node::LiteralOperator(name) => {
                self.write("operator\"\" ");
                self.print(name)?;
            }
            Node::UnnamedType(count) => {
                self.write("'unnamed");
                self.write_text(count);
                self.write("'");
            }
            Node::ClosureType { count, .. } => {
                self.write("'lambda");
                self.write_text(count);
                self.write("'");
                self.print_closure_params(id)?;
            }
            Node::StructuredBinding(names) => {
                self.write("[");
                self.print_with_comma(names)?;
                self.write("]");
            }
            Node::SpecialSubstitution(kind) => {
                self.write("std::");
                self.write(kind.short_name());
            }
            Node::ExpandedSpecialSubstitution(kind) => self.write(kind.expanded()),
            Node::TemplateParam(target) => self.print_left(target)?,
            Node::ForwardTemplateRef { target, .. } => {
                let target = target.ok_or(Error::UnresolvedForwardReference)?;
                self.print_left(target)?;
            }
            Node::FunctionEncoding { ret, name, .. } => {
                if let Some(ret) = ret {
                    self.print_left(ret)?;
                    if !self.has(ret, Component::Rhs) {
                        self.write(" ");
                    }
                }
                self.print(name)?;
            }
            Node::SpecialName { prefix, child } => {
                self.write(prefix);
                self.print(child)?;
            }
            Node::CtorVtableSpecialName { first, second } => {
                self.write("construction vtable for ");
                self.print(first)?;
                self.write("-in-");
                self.print(second)?;
            }
            Node::DotSuffix { prefix, suffix } => {
                self.print(prefix)?;
                self.write(" (");
                self.write_text(suffix);
                self.write(")");
            }
            Node::QualType { child, quals } => {
                self.print_left(child)?;
                self.print_quals(quals);
            }
            Node::VendorExtQualType { child, ext } => {
                self.print(child)?;
                self.write(" ");
                self.write_text(ext);
            }
            Node::PostfixQualifiedType { child, postfix } => {
                self.print_left(child)?;
                self.write(postfix);
            }
            Node::ElaboratedType { kind, child } => {
                self.write(kind);
                self.write(" ");
                self.print(child)?;
            }
            Node::Pointer(pointee) => {
                self.print_left(pointee)?;
                if self.has(pointee, Component::Array) {
                    self.write(" ");
                }
                if self.has_array_or_function(pointee) {
                    self.write("(");
                }
                self.write("*");
            }
            Node::Reference { pointee, kind } => {
                let Some((kind, pointee)) = self.collapse(kind, pointee) else {
                    return Ok(());
                };
                self.print_left(pointee)?;
                if self.has(pointee, Component::Array) {
                    self.write(" ");
                }
                if self.has_array_or_function(pointee) {
                    self.write("(");
                }
                self.write(match kind {
                    RefKind::LValue => "&",
                    RefKind::RValue => "&&",
                });
            }
            Node::PointerToMember { class, member } => {
                self.print_left(member)?;
                if self.has_array_or_function(member) {
                    self.write("(");
                } else {
                    self.write(" ");
                }
                self.print(class)?;
                self.write("::*");
            }
            Node::Array { base, .. } => self.print_left(base)?,
            Node::Function { ret, .. } => {
                self.print_left(ret)?;
                self.write(" ");
            }
            Node::NoexceptSpec(expr) => {
                self.write("noexcept(");
                self.print(expr)?;
                self.write(")");
            }
            Node::DynamicExceptionSpec(types) => {
                self.write("throw(");
                self.print_with_comma(types)?;
                self.write(")");
            }
            Node::Vector { base, dimension } => {
                self.print(base)?;
                self.write(" vector[");
                if let Some(dimension) = dimension {
                    self.print(dimension)?;
                }
                self.write("]");
            }
            Node::PixelVector(dimension) => {
                self.write("pixel vector[");
                self.print(dimension)?;
                self.write("]");
            }
            Node::BinaryFloat(width) => {
                self.write("_Float");
                self.write_text(width);
            }
            Node::TemplateArgumentPack(elems) => self.print_with_comma(elems)?,
            Node::ParameterPack(elems) => {
                if let Some(elem) = self.current_pack_elem(elems) {
                    self.print_left(elem)?;
                }
            }
            Node::PackExpansion(child) => self.print_pack_expansion(child)?,
            Node::Binary { lhs, op, rhs } => {
                // `>` would otherwise close an enclosing template argument list
                if op == ">" {
                    self.write("(");
                }
                self.print_paren(lhs)?;
                self.write(" ");
                self.write(op);
                self.write(" ");
                self.print_paren(rhs)?;
                if op == ">" {
                    self.write(")");
                }
            }
            Node::Prefix { op, child } => {
                self.write(op);
                self.print_paren(child)?;
            }
            Node::Postfix { child, op } => {
                self.print_paren(child)?;
                self.write(op);
            }
            Node::Subscript { base, index } => {
                self.print_paren(base)?;
                self.write("[");
                self.print(index)?;
                self.write("]");
            }
            Node::Member { lhs, op, rhs } => {
                self.print(lhs)?;
                self.write(op);
                self.print(rhs)?;
            }
            Node::Conditional {
                cond,
                then,
                otherwise,
            } => {
                self.print_paren(cond)?;
                self.write(" ? ");
                self.print_paren(then)?;
                self.write(" : ");
                self.print_paren(otherwise)?;
            }
            Node::Call { callee, args } => {
                self.print(callee)?;
                self.write("(");
                self.print_with_comma(args)?;
                self.write(")");
            }
            Node::New {
                exprs,
                ty,
                inits,
                global,
                array,
            } => {
                if global {
                    self.write("::");
                }
                self.write("new");
                if array {
                    self.write("[]");
                }
                self.write(" ");
                if !exprs.is_empty() {
                    self.write("(");
                    self.print_with_comma(exprs)?;
                    self.write(") ");
                }
                self.print(ty)?;
                if !inits.is_empty() {
                    self.write("(");
                    self.print_with_comma(inits)?;
                    self.write(")");
                }
            }
            Node::Delete {
                child,
                global,
                array,
            } => {
                if global {
                    self.write("::");
                }
                self.write("delete");
                if array {
                    self.write("[]");
                }
                self.write(" ");
                self.print(child)?;
            }
            Node::NamedCast { kind, to, from } => {
                self.write(kind);
                self.write("<");
                self.print(to)?;
                self.write(">");
                self.print_paren(from)?;
            }
            Node::Conversion { ty, exprs } => {
                self.print_paren(ty)?;
                self.write("(");
                self.print_with_comma(exprs)?;
                self.write(")");
            }
            Node::Enclosing { prefix, inner } => {
                self.write(prefix);
                self.print_paren(inner)?;
            }
            Node::InitList { ty, inits } => {
                if let Some(ty) = ty {
                    self.print(ty)?;
                }
                self.write("{");
                self.print_with_comma(inits)?;
                self.write("}");
            }
            Node::Braced { elem, init, array } => {
                if array {
                    self.write("[");
                    self.print(elem)?;
                    self.write("]");
                } else {
                    self.write(".");
                    self.print(elem)?;
                }
                self.print_braced_init(init)?;
            }
            Node::BracedRange { first, last, init } => {
                self.write("[");
                self.print(first)?;
                self.write(" ... ");
                self.print(last)?;
                self.write("]");
                self.print_braced_init(init)?;
            }
            Node::Throw(child) => {
                self.write("throw ");
                self.print(child)?;
            }
            Node::Fold {
                left,
                op,
                pack,
                init,
            } => {
                self.write("(");
                if left {
                    if let Some(init) = init {
                        self.print(init)?;
                        self.write(" ");
                        self.write(op);
                        self.write(" ");
                    }
                    self.write("... ");
                    self.write(op);
                    self.write(" ");
                    self.print_fold_pack(pack)?;
                } else {
                    self.print_fold_pack(pack)?;
                    self.write(" ");
                    self.write(op);
                    self.write(" ...");
                    if let Some(init) = init {
                        self.write(" ");
                        self.write(op);
                        self.write(" ");
                        self.print(init)?;
                    }
                }
                self.write(")");
            }
            Node::FunctionParam(number) => {
                self.write("fp");
                self.write_text(number);
            }
            Node::IntegerLiteral { ty, value } => {
                if ty.len() > 3 {
                    self.write("(");
                    self.write(ty);
                    self.write(")");
                }
                self.write_number(value);
                if ty.len() <= 3 {
                    self.write(ty);
                }
            }
            Node::BoolLiteral(value) => self.write(if value { "true" } else { "false" }),
            Node::FloatLiteral { kind, bits } => {
                let input = self.input;
                let digits = std::str::from_utf8(bits.resolve(input))
                    .map_err(|_| Error::UnexpectedText)?;
                let text = match kind {
                    FloatKind::Float => u32::from_str_radix(digits, 16)
                        .map(|bits| hex_double(f32::from_bits(bits) as f64) + "f"),
                    FloatKind::Double => {
                        u64::from_str_radix(digits, 16).map(|bits| hex_double(f64::from_bits(bits)))
                    }
                    FloatKind::LongDouble => {
                        u128::from_str_radix(digits, 16).map(|bits| hex_x87(bits) + "L")
                    }
                }
                .map_err(|_| Error::UnexpectedText)?;
                self.write(&text);
            }
            Node::EnumLiteral { ty, value } => {
                self.print_paren(ty)?;
                self.write_number(value);
            }
            Node::StringLiteral(ty) => {
                self.write("\"<");
                self.print(ty)?;
                self.write(">\"");
            }
            Node::LambdaLiteral(ty) => {
                self.write("[]");
                self.print_closure_params(ty)?;
                self.write("{...}");
            }
            Node::SizeofPack(pack) => {
                self.write("sizeof...(");
                self.print_pack_expansion(pack)?;
                self.write(")");
            }
            Node::NodeList(elems) => self.print_with_comma(elems)?,
        }

        Ok(())
    }

    fn print_right_inner(&mut self, id: NodeId) -> Result<()> {
        match self.arena[id] {
            Node::QualType { child, .. } => self.print_right(child)?,
            Node::TemplateParam(target) => self.print_right(target)?,
            Node::ForwardTemplateRef { target, .. } => {
                let target = target.ok_or(Error::UnresolvedForwardReference)?;
                self.print_right(target)?;
            }
            Node::FunctionEncoding {
                ret,
                params,
                cv,
                ref_qual,
                ..
            } => {
                self.write("(");
                self.print_with_comma(params)?;
                self.write(")");
                if let Some(ret) = ret {
                    self.print_right(ret)?;
                }
                self.print_quals(cv);
                self.print_ref_qual(ref_qual);
            }
            Node::Pointer(pointee) => {
                if self.has_array_or_function(pointee) {
                    self.write(")");
                }
                self.print_right(pointee)?;
            }
            Node::Reference { pointee, kind } => {
                let Some((_, pointee)) = self.collapse(kind, pointee) else {
                    return Ok(());
                };
                if self.has_array_or_function(pointee) {
                    self.write(")");
                }
                self.print_right(pointee)?;
            }
            Node::PointerToMember { member, .. } => {
                if self.has_array_or_function(member) {
                    self.write(")");
                }
                self.print_right(member)?;
            }
            Node::Array { base, dimension } => {
                if self.last_byte() != Some(b']') {
                    self.write(" ");
                }
                self.write("[");
                if let Some(dimension) = dimension {
                    self.print(dimension)?;
                }
                self.write("]");
                self.print_right(base)?;
            }
            Node::Function {
                ret,
                params,
                cv,
                ref_qual,
                exception,
            } => {
                self.write("(");
                self.print_with_comma(params)?;
                self.write(")");
                self.print_right(ret)?;
                self.print_quals(cv);
                self.print_ref_qual(ref_qual);
                if let Some(exception) = exception {
                    self.write(" ");
                    self.print(exception)?;
                }
            }
            Node::ParameterPack(elems) => {
                if let Some(elem) = self.current_pack_elem(elems) {
                    self.print_right(elem)?;
                }
            }
            _ => {}
        }

        Ok(())
    }
}

/// `printf("%a")` spelling of `value`.
fn hex_double(value: f64) -> String {
    let bits = value.to_bits();
    let sign = if bits >> 63 != 0 { "-" } else { "" };
    let exp = ((bits >> 52) & 0x7ff) as i32;
    let frac = bits & ((1 << 52) - 1);

    match (exp, frac) {
        (0x7ff, 0) => format!("{sign}inf"),
        (0x7ff, _) => format!("{sign}nan"),
        (0, 0) => format!("{sign}0x0p+0"),
        // subnormal
        (0, _) => format!("{sign}0x0.{}p-1022", hex_fraction(frac, 13)),
        _ => format!("{sign}0x1{}p{:+}", hex_fraction_dot(frac, 13), exp - 1023),
    }
}

/// `printf("%La")` spelling of an x87 extended value held in the low 80 bits
/// of `bits`. The leading digit is the top nibble of the explicit mantissa.
fn hex_x87(bits: u128) -> String {
    let sign = if (bits >> 79) & 1 != 0 { "-" } else { "" };
    let exp = ((bits >> 64) & 0x7fff) as i32;
    let mantissa = bits as u64;

    if exp == 0x7fff {
        let kind = if mantissa << 1 == 0 { "inf" } else { "nan" };
        return format!("{sign}{kind}");
    }
    if mantissa == 0 {
        return format!("{sign}0x0p+0");
    }

    let lead = mantissa >> 60;
    let rest = hex_fraction_dot(mantissa & ((1 << 60) - 1), 15);
    format!("{sign}0x{lead:x}{rest}p{:+}", exp - 16386)
}

/// The low `width` hex digits of `frac`, trailing zeros removed.
fn hex_fraction(frac: u64, width: usize) -> String {
    let digits = format!("{frac:0width$x}");
    digits.trim_end_matches('0').to_string()
}

fn hex_fraction_dot(frac: u64, width: usize) -> String {
    match hex_fraction(frac, width) {
        digits if digits.is_empty() => digits,
        digits => format!(".{digits}"),
    }
}
