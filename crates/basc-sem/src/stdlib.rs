//! The unified standard-library table.
//!
//! One table serves both ends of the pipeline: the analyzer pre-registers
//! these signatures in the Global scope before traversal, and the emitter
//! consults the same entries for target templates and required imports.
//! Templates use positional `{0}` placeholders over the call arguments.

use crate::types::{TypeId, TypeTable};
use basc_util::Symbol;
use indexmap::IndexMap;

/// One standard-library entry.
#[derive(Debug, Clone)]
pub struct BuiltinDef {
    pub name: Symbol,
    /// Declared parameter types; arity is fixed.
    pub params: Vec<TypeId>,
    pub ret: TypeId,
    /// C#-target expression template with positional placeholders.
    pub template: &'static str,
    /// Namespaces the template requires in the output's using set.
    pub imports: &'static [&'static str],
    /// A support member the output class must carry (e.g. the shared RNG).
    pub support: Option<&'static str>,
}

/// Name-keyed standard-library table with deterministic iteration order.
pub struct StdLib {
    defs: IndexMap<Symbol, BuiltinDef>,
}

const RNG_FIELD: &str = "private static Random __rng = new Random();";

impl StdLib {
    /// Build the table, interning any types it needs.
    pub fn new(types: &mut TypeTable) -> Self {
        let integer = types.integer();
        let long = types.long();
        let single = types.single();
        let double = types.double();
        let string = types.string();
        let boolean = types.boolean();
        let object = types.object();
        let void = types.void();

        let mut defs = IndexMap::new();
        let mut def = |name: &str,
                       params: Vec<TypeId>,
                       ret: TypeId,
                       template: &'static str,
                       imports: &'static [&'static str],
                       support: Option<&'static str>| {
            let name = Symbol::intern(name);
            defs.insert(
                name,
                BuiltinDef {
                    name,
                    params,
                    ret,
                    template,
                    imports,
                    support,
                },
            );
        };

        // Console I/O
        def("Print", vec![object], void, "Console.Write({0})", &["System"], None);
        def(
            "PrintLine",
            vec![object],
            void,
            "Console.WriteLine({0})",
            &["System"],
            None,
        );
        def("Input", vec![], string, "Console.ReadLine()", &["System"], None);
        def("ReadLine", vec![], string, "Console.ReadLine()", &["System"], None);

        // Strings. Mid and InStr are 1-based in the source language.
        def("Len", vec![string], integer, "({0}).Length", &[], None);
        def(
            "Mid",
            vec![string, integer, integer],
            string,
            "({0}).Substring(({1}) - 1, {2})",
            &[],
            None,
        );
        def(
            "Left",
            vec![string, integer],
            string,
            "({0}).Substring(0, {1})",
            &[],
            None,
        );
        def(
            "Right",
            vec![string, integer],
            string,
            "({0}).Substring(({0}).Length - ({1}))",
            &[],
            None,
        );
        def("UCase", vec![string], string, "({0}).ToUpper()", &[], None);
        def("LCase", vec![string], string, "({0}).ToLower()", &[], None);
        def("Trim", vec![string], string, "({0}).Trim()", &[], None);
        def(
            "InStr",
            vec![string, string],
            integer,
            "(({0}).IndexOf({1}) + 1)",
            &[],
            None,
        );
        def(
            "Replace",
            vec![string, string, string],
            string,
            "({0}).Replace({1}, {2})",
            &[],
            None,
        );

        // Math
        def("Abs", vec![double], double, "Math.Abs({0})", &["System"], None);
        def("Sqrt", vec![double], double, "Math.Sqrt({0})", &["System"], None);
        def(
            "Pow",
            vec![double, double],
            double,
            "Math.Pow({0}, {1})",
            &["System"],
            None,
        );
        def("Sin", vec![double], double, "Math.Sin({0})", &["System"], None);
        def("Cos", vec![double], double, "Math.Cos({0})", &["System"], None);
        def("Tan", vec![double], double, "Math.Tan({0})", &["System"], None);
        def("Log", vec![double], double, "Math.Log({0})", &["System"], None);
        def("Exp", vec![double], double, "Math.Exp({0})", &["System"], None);
        def("Floor", vec![double], double, "Math.Floor({0})", &["System"], None);
        def(
            "Ceiling",
            vec![double],
            double,
            "Math.Ceiling({0})",
            &["System"],
            None,
        );
        def("Round", vec![double], double, "Math.Round({0})", &["System"], None);
        def(
            "Min",
            vec![double, double],
            double,
            "Math.Min({0}, {1})",
            &["System"],
            None,
        );
        def(
            "Max",
            vec![double, double],
            double,
            "Math.Max({0}, {1})",
            &["System"],
            None,
        );

        // Random
        def(
            "Rnd",
            vec![],
            double,
            "__rng.NextDouble()",
            &["System"],
            Some(RNG_FIELD),
        );
        def(
            "Randomize",
            vec![],
            void,
            "__rng = new Random()",
            &["System"],
            Some(RNG_FIELD),
        );

        // Conversions
        def(
            "CInt",
            vec![object],
            integer,
            "Convert.ToInt32({0})",
            &["System"],
            None,
        );
        def(
            "CLng",
            vec![object],
            long,
            "Convert.ToInt64({0})",
            &["System"],
            None,
        );
        def(
            "CDbl",
            vec![object],
            double,
            "Convert.ToDouble({0})",
            &["System"],
            None,
        );
        def(
            "CSng",
            vec![object],
            single,
            "Convert.ToSingle({0})",
            &["System"],
            None,
        );
        def(
            "CStr",
            vec![object],
            string,
            "Convert.ToString({0})",
            &["System"],
            None,
        );
        def(
            "CBool",
            vec![object],
            boolean,
            "Convert.ToBoolean({0})",
            &["System"],
            None,
        );

        // Arrays
        def(
            "UBound",
            vec![object],
            integer,
            "(({0}).Length - 1)",
            &[],
            None,
        );
        def("LBound", vec![object], integer, "0", &[], None);

        Self { defs }
    }

    /// Look up an entry by name.
    pub fn get(&self, name: Symbol) -> Option<&BuiltinDef> {
        self.defs.get(&name)
    }

    pub fn contains(&self, name: Symbol) -> bool {
        self.defs.contains_key(&name)
    }

    /// Iterate entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &BuiltinDef> {
        self.defs.values()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// Substitute positional `{n}` placeholders in a template.
///
/// Used for both standard-library templates and extern implementation
/// templates. A template without placeholders is returned unchanged.
pub fn apply_template(template: &str, args: &[String]) -> String {
    let mut out = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        out = out.replace(&format!("{{{}}}", i), arg);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeTable;

    #[test]
    fn test_full_registration() {
        let mut types = TypeTable::new();
        let stdlib = StdLib::new(&mut types);

        for name in [
            "Print", "PrintLine", "Input", "ReadLine", "Len", "Mid", "Left", "Right", "UCase",
            "LCase", "Trim", "InStr", "Replace", "Abs", "Sqrt", "Pow", "Sin", "Cos", "Tan", "Log",
            "Exp", "Floor", "Ceiling", "Round", "Min", "Max", "Rnd", "Randomize", "CInt", "CLng",
            "CDbl", "CSng", "CStr", "CBool", "UBound", "LBound",
        ] {
            assert!(
                stdlib.contains(Symbol::intern(name)),
                "missing builtin {}",
                name
            );
        }
    }

    #[test]
    fn test_signatures() {
        let mut types = TypeTable::new();
        let stdlib = StdLib::new(&mut types);

        let len = stdlib.get(Symbol::intern("Len")).unwrap();
        assert_eq!(len.params, vec![types.string()]);
        assert_eq!(len.ret, types.integer());

        let mid = stdlib.get(Symbol::intern("Mid")).unwrap();
        assert_eq!(mid.params.len(), 3);
        assert_eq!(mid.ret, types.string());

        let rnd = stdlib.get(Symbol::intern("Rnd")).unwrap();
        assert!(rnd.params.is_empty());
        assert_eq!(rnd.ret, types.double());
        assert!(rnd.support.is_some());
    }

    #[test]
    fn test_apply_template() {
        assert_eq!(
            apply_template("Math.Pow({0}, {1})", &["x".into(), "2".into()]),
            "Math.Pow(x, 2)"
        );
        assert_eq!(
            apply_template("({0}).Substring(({0}).Length - ({1}))", &["s".into(), "3".into()]),
            "(s).Substring((s).Length - (3))"
        );
        assert_eq!(apply_template("Console.ReadLine()", &[]), "Console.ReadLine()");
    }

    #[test]
    fn test_iteration_is_deterministic() {
        let mut types = TypeTable::new();
        let stdlib = StdLib::new(&mut types);
        let first: Vec<_> = stdlib.iter().map(|d| d.name).collect();

        let mut types2 = TypeTable::new();
        let stdlib2 = StdLib::new(&mut types2);
        let second: Vec<_> = stdlib2.iter().map(|d| d.name).collect();

        assert_eq!(first, second);
        assert_eq!(first[0].as_str(), "Print");
    }
}
