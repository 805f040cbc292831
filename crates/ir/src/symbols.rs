//! Program-wide symbol table of types, fields and methods.
//!
//! The table is populated before any pass runs and is only read afterwards;
//! passes receive it as `&SymbolTable` and never mutate it.

use std::fmt;

use cranelift_entity::{entity_impl, PrimaryMap};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::ValueKind;

/// Name of instance constructors.
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// Name of the method that completes a builder.
pub const BUILD_METHOD_NAME: &str = "build";

/// An opaque reference to [`TypeData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef(u32);
entity_impl!(TypeRef);

/// An opaque reference to [`FieldData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldRef(u32);
entity_impl!(FieldRef);

/// An opaque reference to [`MethodData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodRef(u32);
entity_impl!(MethodRef);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeData {
    pub name: SmolStr,
}

/// A (declaring type, name, value kind) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldData {
    pub class: TypeRef,
    pub name: SmolStr,
    pub kind: ValueKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodData {
    pub class: TypeRef,
    pub name: SmolStr,
    pub params: SmallVec<[ValueKind; 4]>,
    pub ret: Option<ValueKind>,
    pub is_static: bool,
}

impl MethodData {
    /// Number of argument registers an invocation passes, including the
    /// receiver of instance methods.
    pub fn arg_width(&self) -> u16 {
        let receiver = if self.is_static { 0 } else { 1 };
        receiver + self.params.iter().map(|kind| kind.width()).sum::<u16>()
    }

    /// Kinds of the argument registers in order, including the receiver.
    pub fn arg_kinds(&self) -> impl Iterator<Item = ValueKind> + '_ {
        let receiver = (!self.is_static).then_some(ValueKind::Object);
        receiver.into_iter().chain(self.params.iter().copied())
    }
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    types: PrimaryMap<TypeRef, TypeData>,
    fields: PrimaryMap<FieldRef, FieldData>,
    methods: PrimaryMap<MethodRef, MethodData>,

    type_by_name: FxHashMap<SmolStr, TypeRef>,
    fields_by_class: FxHashMap<TypeRef, Vec<FieldRef>>,
    methods_by_class: FxHashMap<TypeRef, Vec<MethodRef>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a type by its descriptor name.
    pub fn make_type(&mut self, name: &str) -> TypeRef {
        if let Some(&ty) = self.type_by_name.get(name) {
            return ty;
        }

        let name = SmolStr::new(name);
        let ty = self.types.push(TypeData { name: name.clone() });
        self.type_by_name.insert(name, ty);
        ty
    }

    pub fn make_field(&mut self, class: TypeRef, name: &str, kind: ValueKind) -> FieldRef {
        let data = FieldData {
            class,
            name: name.into(),
            kind,
        };
        if let Some(&field) = self
            .fields_by_class
            .get(&class)
            .and_then(|fields| fields.iter().find(|&&f| self.fields[f] == data))
        {
            return field;
        }

        let field = self.fields.push(data);
        self.fields_by_class.entry(class).or_default().push(field);
        field
    }

    pub fn make_method(
        &mut self,
        class: TypeRef,
        name: &str,
        params: &[ValueKind],
        ret: Option<ValueKind>,
        is_static: bool,
    ) -> MethodRef {
        let data = MethodData {
            class,
            name: name.into(),
            params: params.into(),
            ret,
            is_static,
        };
        if let Some(&method) = self
            .methods_by_class
            .get(&class)
            .and_then(|methods| methods.iter().find(|&&m| self.methods[m] == data))
        {
            return method;
        }

        let method = self.methods.push(data);
        self.methods_by_class.entry(class).or_default().push(method);
        method
    }

    pub fn lookup_type(&self, name: &str) -> Option<TypeRef> {
        self.type_by_name.get(name).copied()
    }

    pub fn type_data(&self, ty: TypeRef) -> &TypeData {
        &self.types[ty]
    }

    pub fn field(&self, field: FieldRef) -> &FieldData {
        &self.fields[field]
    }

    pub fn method(&self, method: MethodRef) -> &MethodData {
        &self.methods[method]
    }

    /// Returns the instance fields declared by `class`.
    pub fn fields_of(&self, class: TypeRef) -> &[FieldRef] {
        self.fields_by_class
            .get(&class)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the methods declared by `class`.
    pub fn methods_of(&self, class: TypeRef) -> &[MethodRef] {
        self.methods_by_class
            .get(&class)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the first method of `class` named `name`.
    pub fn find_method(&self, class: TypeRef, name: &str) -> Option<MethodRef> {
        self.methods_of(class)
            .iter()
            .copied()
            .find(|&m| self.methods[m].name == name)
    }

    pub fn is_constructor(&self, method: MethodRef) -> bool {
        self.methods[method].name == CONSTRUCTOR_NAME
    }

    pub fn display_type(&self, ty: TypeRef) -> DisplayType<'_> {
        DisplayType { symbols: self, ty }
    }
}

pub struct DisplayType<'a> {
    symbols: &'a SymbolTable,
    ty: TypeRef,
}

impl fmt::Display for DisplayType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.symbols.type_data(self.ty).name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut symbols = SymbolTable::new();
        let builder = symbols.make_type("LFooBuilder;");
        assert_eq!(builder, symbols.make_type("LFooBuilder;"));

        let x = symbols.make_field(builder, "x", ValueKind::Narrow);
        assert_eq!(x, symbols.make_field(builder, "x", ValueKind::Narrow));
        let y = symbols.make_field(builder, "y", ValueKind::Wide);
        assert_eq!(symbols.fields_of(builder), &[x, y]);

        let init = symbols.make_method(builder, CONSTRUCTOR_NAME, &[], None, false);
        let build = symbols.make_method(builder, BUILD_METHOD_NAME, &[], Some(ValueKind::Object), false);
        assert!(symbols.is_constructor(init));
        assert!(!symbols.is_constructor(build));
        assert_eq!(symbols.find_method(builder, BUILD_METHOD_NAME), Some(build));
    }

    #[test]
    fn arg_width_counts_receiver_and_wide_params() {
        let mut symbols = SymbolTable::new();
        let ty = symbols.make_type("LFoo;");
        let m = symbols.make_method(
            ty,
            "bar",
            &[ValueKind::Wide, ValueKind::Narrow],
            None,
            false,
        );
        let s = symbols.make_method(ty, "baz", &[ValueKind::Object], None, true);

        assert_eq!(symbols.method(m).arg_width(), 4);
        assert_eq!(symbols.method(s).arg_width(), 1);
        assert_eq!(
            symbols.method(m).arg_kinds().collect::<Vec<_>>(),
            vec![ValueKind::Object, ValueKind::Wide, ValueKind::Narrow]
        );
    }
}
