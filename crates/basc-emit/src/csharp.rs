//! The structured C# emitter.
//!
//! Emission is a single depth-first traversal of each function's CFG. The
//! walk dispatches on the [`BlockKind`] tags the builder set: loop headers
//! become `while`, body-first entries become `do/while`, if/else arms are
//! braced and rejoined at their merge block, switches group case values by
//! shared target. A loop-end stack turns branches to the innermost loop end
//! into `break;`.
//!
//! Compiler temporaries never reach the output: a use-count map and a
//! first-definition-wins temp table let `emit_value` inline every temp's
//! defining expression at its use site, so only declared identifiers appear
//! as statement destinations.

use crate::config::EmitterConfig;
use crate::error::{EmitError, Result};
use crate::sanitize::{sanitize_dotted, sanitize_identifier};
use basc_ast::Platform;
use basc_ir::{
    BasicBlock, BinaryOp, BlockId, BlockKind, ClassMeta, CompareOp, Function, Inst, InstKind,
    Module, SwitchArm, UnaryOp, Value,
};
use basc_sem::{stdlib::apply_template, ConstValue, StdLib, TypeId, TypeKind, TypeTable};
use basc_util::{FxHashMap, FxHashSet, Symbol};
use std::collections::BTreeSet;

/// Indented line buffer.
struct CodeBuf {
    lines: Vec<String>,
    indent: usize,
    unit: String,
}

impl CodeBuf {
    fn new(unit: String) -> Self {
        Self {
            lines: Vec::new(),
            indent: 0,
            unit,
        }
    }

    fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines.push(format!("{}{}", self.unit.repeat(self.indent), text));
        }
    }

    fn open(&mut self, header: impl AsRef<str>) {
        self.line(header);
        self.line("{");
        self.indent += 1;
    }

    fn close(&mut self) {
        self.indent -= 1;
        self.line("}");
    }

    fn last_trimmed(&self) -> Option<&str> {
        self.lines.last().map(|l| l.trim())
    }

    fn pop(&mut self) {
        self.lines.pop();
    }

    fn finish(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

/// The C# emitter.
///
/// Output is deterministic: given the same module and configuration, the
/// result is byte-identical. All metadata iteration follows insertion
/// order; the using set is sorted.
pub struct CsharpEmitter<'a> {
    module: &'a Module,
    types: &'a TypeTable,
    stdlib: &'a StdLib,
    config: &'a EmitterConfig,
    imports: BTreeSet<String>,
    support: Vec<&'static str>,
}

impl<'a> CsharpEmitter<'a> {
    pub fn new(
        module: &'a Module,
        types: &'a TypeTable,
        stdlib: &'a StdLib,
        config: &'a EmitterConfig,
    ) -> Self {
        let mut imports = BTreeSet::new();
        for import in &module.imports {
            imports.insert(import.as_str().to_string());
        }
        Self {
            module,
            types,
            stdlib,
            config,
            imports,
            support: Vec::new(),
        }
    }

    /// Emit the whole module as C# source text.
    pub fn emit(mut self) -> Result<String> {
        log::debug!(
            "emitting {} function(s), {} class(es)",
            self.module.functions.len(),
            self.module.classes.len()
        );
        let unit = self.config.indent_unit();

        // Bodies first: emitting them discovers the required usings and
        // support members the header needs.
        let mut program_members: Vec<String> = Vec::new();

        for global in &self.module.globals {
            let ty = self.type_name(global.ty);
            let name = sanitize_identifier(global.name.as_str());
            let init = global
                .init
                .as_ref()
                .map(|v| match v {
                    Value::Constant(c) => format!(" = {}", literal(c)),
                    Value::Ref(r) => format!(" = {}", sanitize_identifier(r.as_str())),
                })
                .unwrap_or_default();
            program_members.push(format!("public static {} {}{};", ty, name, init));
        }

        let module = self.module;
        let free: Vec<&'a Function> = module.free_functions().collect();
        for func in free {
            let access = if func.name.starts_with("__lambda") {
                "private"
            } else {
                self.config.method_access.keyword()
            };
            let header = self.method_header(func, access, true, func.name, false)?;
            let text = self.emit_function_text(func, header, None)?;
            program_members.push(text);
        }

        if self.config.synthesize_main && !self.module.functions.contains_key(&Symbol::intern("Main"))
        {
            program_members.push("public static void Main(string[] args)\n{\n}".to_string());
        }

        let mut type_decls: Vec<String> = Vec::new();
        let class_names: Vec<Symbol> = self.module.classes.keys().copied().collect();
        for name in class_names {
            let text = self.emit_class(name)?;
            type_decls.push(text);
        }
        type_decls.extend(self.emit_interfaces()?);
        type_decls.extend(self.emit_enums());
        type_decls.extend(self.emit_delegates());

        // Assemble.
        let mut buf = CodeBuf::new(unit);
        for import in &self.imports {
            buf.line(format!("using {};", import));
        }
        if !self.imports.is_empty() {
            buf.line("");
        }

        buf.open(format!(
            "namespace {}",
            sanitize_dotted(&self.config.namespace)
        ));

        buf.open(format!(
            "{} class {}",
            self.config.class_access.keyword(),
            sanitize_identifier(&self.config.class_name)
        ));
        for member in &self.support {
            buf.line(*member);
        }
        for (i, member) in program_members.iter().enumerate() {
            if i > 0 || !self.support.is_empty() {
                buf.line("");
            }
            push_indented(&mut buf, member);
        }
        buf.close();

        for decl in &type_decls {
            buf.line("");
            push_indented(&mut buf, decl);
        }

        buf.close();
        Ok(buf.finish())
    }

    // ------------------------------------------------------------------
    // Type declarations
    // ------------------------------------------------------------------

    fn emit_class(&mut self, name: Symbol) -> Result<String> {
        let module = self.module;
        let meta: ClassMeta = module.classes[&name].clone();
        let unit = self.config.indent_unit();
        let mut buf = CodeBuf::new(unit);

        let mut header = format!("public class {}", sanitize_identifier(meta.name.as_str()));
        if !meta.generic_params.is_empty() {
            let params: Vec<String> = meta
                .generic_params
                .iter()
                .map(|p| sanitize_identifier(p.as_str()))
                .collect();
            header.push_str(&format!("<{}>", params.join(", ")));
        }
        let mut bases: Vec<String> = Vec::new();
        if let Some(base) = meta.base {
            bases.push(sanitize_identifier(base.as_str()));
        }
        for iface in &meta.interfaces {
            bases.push(sanitize_identifier(iface.as_str()));
        }
        if !bases.is_empty() {
            header.push_str(&format!(" : {}", bases.join(", ")));
        }
        buf.open(header);

        for field in &meta.fields {
            let staticness = if field.is_static { "static " } else { "" };
            let init = field
                .init
                .as_ref()
                .map(|v| match v {
                    Value::Constant(c) => format!(" = {}", literal(c)),
                    Value::Ref(r) => format!(" = {}", sanitize_identifier(r.as_str())),
                })
                .unwrap_or_default();
            buf.line(format!(
                "public {}{} {}{};",
                staticness,
                self.type_name(field.ty),
                sanitize_identifier(field.name.as_str()),
                init
            ));
        }

        for event in &meta.events {
            buf.line(format!(
                "public event {} {};",
                self.type_name(event.delegate),
                sanitize_identifier(event.name.as_str())
            ));
        }

        for ctor_key in &meta.constructors {
            let func = module.get_function(*ctor_key).ok_or_else(|| {
                EmitError::Internal {
                    func: *ctor_key,
                    message: "constructor function missing from module".to_string(),
                }
            })?;
            let params = self.param_list(func);
            let mut header = format!(
                "public {}({})",
                sanitize_identifier(meta.name.as_str()),
                params
            );
            let base_args = if meta.base.is_some() && !meta.base_ctor_args.is_empty() {
                Some(meta.base_ctor_args.clone())
            } else {
                None
            };
            if base_args.is_some() {
                header.push_str(" : base(__BASE_ARGS__)");
            }
            let text = self.emit_function_text(func, header, base_args)?;
            buf.line("");
            push_indented(&mut buf, &text);
        }

        for method in &meta.methods {
            let func = module.get_function(method.func).ok_or_else(|| {
                EmitError::Internal {
                    func: method.func,
                    message: "method function missing from module".to_string(),
                }
            })?;
            let access = self.config.method_access.keyword();
            let header =
                self.method_header(func, access, method.is_static, method.name, method.is_override)?;
            let text = self.emit_function_text(func, header, None)?;
            buf.line("");
            push_indented(&mut buf, &text);
        }

        for prop in &meta.properties {
            buf.line("");
            buf.open(format!(
                "public {} {}",
                self.type_name(prop.ty),
                sanitize_identifier(prop.name.as_str())
            ));
            if let Some(getter) = prop.getter {
                if let Some(func) = module.get_function(getter) {
                    let text = self.emit_function_text(func, "get".to_string(), None)?;
                    push_indented(&mut buf, &text);
                }
            }
            if let Some(setter) = prop.setter {
                if let Some(func) = module.get_function(setter) {
                    let text = self.emit_function_text(func, "set".to_string(), None)?;
                    push_indented(&mut buf, &text);
                }
            }
            buf.close();
        }

        buf.close();
        Ok(buf.finish())
    }

    fn emit_interfaces(&mut self) -> Result<Vec<String>> {
        let module = self.module;
        let unit = self.config.indent_unit();
        let names: Vec<Symbol> = module.interfaces.keys().copied().collect();
        let mut out = Vec::new();

        for name in names {
            let meta = module.interfaces[&name].clone();
            let mut buf = CodeBuf::new(unit.clone());
            buf.open(format!(
                "public interface {}",
                sanitize_identifier(meta.name.as_str())
            ));
            for method in &meta.methods {
                let params: Vec<String> = method
                    .params
                    .iter()
                    .map(|p| {
                        format!(
                            "{} {}",
                            self.type_name(p.ty),
                            sanitize_identifier(p.name.as_str())
                        )
                    })
                    .collect();
                let ret = if self.types.is_void(method.ret) {
                    "void".to_string()
                } else {
                    self.type_name(method.ret)
                };
                match method.default_impl {
                    // Default methods carry their implementation body.
                    Some(key) => {
                        if let Some(func) = module.get_function(key) {
                            let header = format!(
                                "{} {}({})",
                                ret,
                                sanitize_identifier(method.name.as_str()),
                                params.join(", ")
                            );
                            let text = self.emit_function_text(func, header, None)?;
                            push_indented(&mut buf, &text);
                        }
                    }
                    None => buf.line(format!(
                        "{} {}({});",
                        ret,
                        sanitize_identifier(method.name.as_str()),
                        params.join(", ")
                    )),
                }
            }
            buf.close();
            out.push(buf.finish());
        }
        Ok(out)
    }

    fn emit_enums(&mut self) -> Vec<String> {
        let unit = self.config.indent_unit();
        let mut out = Vec::new();
        for meta in self.module.enums.values() {
            let mut buf = CodeBuf::new(unit.clone());
            let mut header = format!("public enum {}", sanitize_identifier(meta.name.as_str()));
            if meta.underlying != self.types.integer() {
                header.push_str(&format!(" : {}", self.type_name(meta.underlying)));
            }
            buf.open(header);
            for (member, value) in &meta.members {
                buf.line(format!(
                    "{} = {},",
                    sanitize_identifier(member.as_str()),
                    value
                ));
            }
            buf.close();
            out.push(buf.finish());
        }
        out
    }

    fn emit_delegates(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        for meta in self.module.delegates.values() {
            let params: Vec<String> = meta
                .params
                .iter()
                .map(|p| {
                    format!(
                        "{} {}",
                        self.type_name(p.ty),
                        sanitize_identifier(p.name.as_str())
                    )
                })
                .collect();
            let ret = if self.types.is_void(meta.ret) {
                "void".to_string()
            } else {
                self.type_name(meta.ret)
            };
            out.push(format!(
                "public delegate {} {}({});\n",
                ret,
                sanitize_identifier(meta.name.as_str()),
                params.join(", ")
            ));
        }
        out
    }

    // ------------------------------------------------------------------
    // Function plumbing
    // ------------------------------------------------------------------

    fn param_list(&self, func: &Function) -> String {
        func.params
            .iter()
            .map(|p| {
                format!(
                    "{} {}",
                    self.type_name(p.ty),
                    sanitize_identifier(p.name.as_str())
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Build a method header, adjusting the return type for async and
    /// iterator functions.
    fn method_header(
        &mut self,
        func: &Function,
        access: &str,
        is_static: bool,
        display_name: Symbol,
        is_override: bool,
    ) -> Result<String> {
        let mut ret = if self.types.is_void(func.return_type) {
            "void".to_string()
        } else {
            self.type_name(func.return_type)
        };

        let mut qualifiers = String::new();
        if is_static {
            qualifiers.push_str("static ");
        }
        if is_override {
            qualifiers.push_str("override ");
        }
        if func.flags.is_async {
            qualifiers.push_str("async ");
            self.imports.insert("System.Threading.Tasks".to_string());
            ret = if ret == "void" {
                "Task".to_string()
            } else {
                format!("Task<{}>", ret)
            };
        }
        if func.flags.is_iterator {
            self.imports.insert("System.Collections.Generic".to_string());
            ret = if ret == "void" {
                "IEnumerable<object>".to_string()
            } else {
                format!("IEnumerable<{}>", ret)
            };
        }

        let mut name = sanitize_identifier(display_name.as_str());
        if !func.generic_params.is_empty() {
            let params: Vec<String> = func
                .generic_params
                .iter()
                .map(|p| sanitize_identifier(p.as_str()))
                .collect();
            name.push_str(&format!("<{}>", params.join(", ")));
        }

        Ok(format!(
            "{} {}{} {}({})",
            access,
            qualifiers,
            ret,
            name,
            self.param_list(func)
        ))
    }

    /// Emit one function as `header { body }` text at relative indent 0.
    fn emit_function_text(
        &mut self,
        func: &'a Function,
        header: String,
        base_args: Option<Vec<Value>>,
    ) -> Result<String> {
        let mut fe = FunctionEmitter::new(
            self.module,
            self.types,
            self.stdlib,
            self.config,
            &mut self.imports,
            &mut self.support,
            func,
        );
        fe.emit(header, base_args)
    }

    fn type_name(&self, ty: TypeId) -> String {
        type_name(self.types, ty)
    }
}

/// Splice a multi-line chunk into a buffer at the buffer's current indent.
fn push_indented(buf: &mut CodeBuf, text: &str) {
    for line in text.lines() {
        buf.line(line);
    }
}

/// C# spelling of an interned type.
fn type_name(types: &TypeTable, ty: TypeId) -> String {
    let resolved = types.resolve_alias(ty);
    match types.kind_of(resolved) {
        TypeKind::Void => "void".to_string(),
        TypeKind::Primitive(kind) => match kind {
            basc_sem::NumericKind::Integer => "int".to_string(),
            basc_sem::NumericKind::Long => "long".to_string(),
            basc_sem::NumericKind::Single => "float".to_string(),
            basc_sem::NumericKind::Double => "double".to_string(),
        },
        TypeKind::String => "string".to_string(),
        TypeKind::Boolean => "bool".to_string(),
        TypeKind::Char => "char".to_string(),
        TypeKind::Array { elem, rank, .. } => {
            let commas = ",".repeat((*rank).saturating_sub(1) as usize);
            format!("{}[{}]", type_name(types, *elem), commas)
        }
        TypeKind::Pointer { elem } => format!("{}*", type_name(types, *elem)),
        TypeKind::Nullable { inner } => format!("{}?", type_name(types, *inner)),
        TypeKind::Tuple { elems } => {
            let parts: Vec<String> = elems
                .iter()
                .map(|e| match e.name {
                    Some(name) => format!(
                        "{} {}",
                        type_name(types, e.ty),
                        sanitize_identifier(name.as_str())
                    ),
                    None => type_name(types, e.ty),
                })
                .collect();
            format!("({})", parts.join(", "))
        }
        TypeKind::GenericInstance { base, args } => {
            let args: Vec<String> = args.iter().map(|a| type_name(types, *a)).collect();
            format!(
                "{}<{}>",
                sanitize_identifier(types.name_of(*base).as_str()),
                args.join(", ")
            )
        }
        TypeKind::Null | TypeKind::Error => "object".to_string(),
        TypeKind::Delegate { .. }
        | TypeKind::Class { .. }
        | TypeKind::Interface { .. }
        | TypeKind::Structure { .. }
        | TypeKind::Enum { .. }
        | TypeKind::GenericParam
        | TypeKind::UserDefined { .. } => sanitize_identifier(types.name_of(resolved).as_str()),
    }
}

/// C# literal spelling of a constant.
fn literal(c: &ConstValue) -> String {
    match c {
        ConstValue::Int(v) => v.to_string(),
        ConstValue::Float(v) => {
            // `{:?}` keeps a trailing `.0` on whole numbers, which C#
            // requires to keep the literal a double.
            format!("{:?}", v)
        }
        ConstValue::Str(s) => {
            let mut out = String::with_capacity(s.len() + 2);
            out.push('"');
            for ch in s.chars() {
                match ch {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\r' => out.push_str("\\r"),
                    '\t' => out.push_str("\\t"),
                    '\0' => out.push_str("\\0"),
                    other => out.push(other),
                }
            }
            out.push('"');
            out
        }
        ConstValue::Bool(v) => v.to_string(),
        ConstValue::Char(v) => match v {
            '\'' => "'\\''".to_string(),
            '\\' => "'\\\\'".to_string(),
            '\n' => "'\\n'".to_string(),
            '\r' => "'\\r'".to_string(),
            '\t' => "'\\t'".to_string(),
            '\0' => "'\\0'".to_string(),
            other => format!("'{}'", other),
        },
        ConstValue::Null => "null".to_string(),
    }
}

// ----------------------------------------------------------------------------
// Per-function emission
// ----------------------------------------------------------------------------

struct FunctionEmitter<'e> {
    module: &'e Module,
    types: &'e TypeTable,
    stdlib: &'e StdLib,
    config: &'e EmitterConfig,
    imports: &'e mut BTreeSet<String>,
    support: &'e mut Vec<&'static str>,
    func: &'e Function,

    /// Names allowed as statement destinations.
    declared: FxHashSet<Symbol>,
    /// Names assigned somewhere in the function.
    assigned: FxHashSet<Symbol>,
    /// Operand reference counts, in program order.
    use_counts: FxHashMap<Symbol, usize>,
    /// Temp name to first defining instruction (first definition wins).
    temp_defs: FxHashMap<Symbol, (BlockId, usize)>,

    processed: FxHashSet<BlockId>,
    emitted_regions: FxHashSet<usize>,
    loop_end_stack: Vec<BlockId>,
    declared_emitted: FxHashSet<Symbol>,
    buf: CodeBuf,
}

impl<'e> FunctionEmitter<'e> {
    #[allow(clippy::too_many_arguments)]
    fn new(
        module: &'e Module,
        types: &'e TypeTable,
        stdlib: &'e StdLib,
        config: &'e EmitterConfig,
        imports: &'e mut BTreeSet<String>,
        support: &'e mut Vec<&'static str>,
        func: &'e Function,
    ) -> Self {
        let mut declared: FxHashSet<Symbol> = FxHashSet::default();
        declared.extend(func.declared_names());
        for global in &module.globals {
            declared.insert(global.name);
        }
        declared.insert(Symbol::intern("this"));
        declared.insert(Symbol::intern("base"));

        let mut use_counts: FxHashMap<Symbol, usize> = FxHashMap::default();
        let mut assigned: FxHashSet<Symbol> = FxHashSet::default();
        let mut temp_defs: FxHashMap<Symbol, (BlockId, usize)> = FxHashMap::default();

        for (block_id, block) in func.blocks.iter_enumerated() {
            for (idx, inst) in block.insts.iter().enumerate() {
                for operand in inst.operands() {
                    if let Value::Ref(name) = operand {
                        *use_counts.entry(*name).or_insert(0) += 1;
                    }
                }
                if let Some(result) = inst.result {
                    if declared.contains(&result) {
                        assigned.insert(result);
                    } else if !temp_defs.contains_key(&result) {
                        temp_defs.insert(result, (block_id, idx));
                    }
                }
                if let InstKind::Assign { target, .. } = &inst.kind {
                    if declared.contains(target) {
                        assigned.insert(*target);
                    }
                }
            }
        }

        Self {
            module,
            types,
            stdlib,
            config,
            imports,
            support,
            func,
            declared,
            assigned,
            use_counts,
            temp_defs,
            processed: FxHashSet::default(),
            emitted_regions: FxHashSet::default(),
            loop_end_stack: Vec::new(),
            declared_emitted: FxHashSet::default(),
            buf: CodeBuf::new(config.indent_unit()),
        }
    }

    fn internal(&self, message: impl Into<String>) -> EmitError {
        EmitError::Internal {
            func: self.func.name,
            message: message.into(),
        }
    }

    fn emit(mut self, header: String, base_args: Option<Vec<Value>>) -> Result<String> {
        // Base-constructor arguments are expressions over the entry block;
        // counting them as uses keeps their defining calls out of the body.
        let header = match base_args {
            Some(args) => {
                for arg in &args {
                    if let Value::Ref(name) = arg {
                        *self.use_counts.entry(*name).or_insert(0) += 1;
                    }
                }
                let mut texts = Vec::new();
                for arg in &args {
                    let mut visited = Vec::new();
                    texts.push(self.emit_value(arg, false, &mut visited)?);
                }
                header.replace("__BASE_ARGS__", &texts.join(", "))
            }
            None => header,
        };

        self.buf.line(&header);
        self.buf.line("{");
        self.buf.indent += 1;

        // Locals that are read but never assigned still need a declaration.
        let catch_vars: FxHashSet<Symbol> = self
            .func
            .try_regions
            .iter()
            .flat_map(|r| r.catches.iter().filter_map(|c| c.var))
            .collect();
        let prologue: Vec<(Symbol, TypeId)> = self
            .func
            .locals
            .iter()
            .filter(|l| {
                !self.assigned.contains(&l.name)
                    && !catch_vars.contains(&l.name)
                    && self.use_counts.get(&l.name).copied().unwrap_or(0) > 0
            })
            .map(|l| (l.name, l.ty))
            .collect();
        for (name, ty) in prologue {
            let line = format!(
                "{} {} = default;",
                type_name(self.types, ty),
                sanitize_identifier(name.as_str())
            );
            self.buf.line(line);
            self.declared_emitted.insert(name);
        }

        let mut next = Some(self.func.entry);
        while let Some(block) = next {
            next = self.emit_chain(block, None)?;
        }

        // A trailing bare `return;` in a void body is purely cosmetic.
        if self.types.is_void(self.func.return_type)
            && !self.func.flags.is_iterator
            && self.buf.last_trimmed() == Some("return;")
        {
            self.buf.pop();
        }

        self.buf.indent -= 1;
        self.buf.line("}");
        Ok(self.buf.finish())
    }

    // ------------------------------------------------------------------
    // Structured control flow
    // ------------------------------------------------------------------

    /// Emit the straight-line chain starting at `start`.
    ///
    /// Returns `Some(block)` when control continues at a merge/end block the
    /// caller should resume from, `None` when every path of the chain has
    /// returned, broken, or rejoined an already-processed block.
    fn emit_chain(&mut self, start: BlockId, stop: Option<BlockId>) -> Result<Option<BlockId>> {
        let func = self.func;
        let mut current = start;

        loop {
            if Some(current) == stop {
                return Ok(None);
            }
            if self.processed.contains(&current) {
                return Ok(None);
            }

            // A block opening a try region emits the whole construct.
            if let Some(region_idx) = func.try_regions.iter().position(|r| r.body == current) {
                if !self.emitted_regions.contains(&region_idx) {
                    self.emit_try(region_idx)?;
                    current = func.try_regions[region_idx].end;
                    continue;
                }
            }

            // Unreachable filler (a merge every path returned around) is
            // not emitted. Catch and finally blocks have no CFG
            // predecessors either but are reached through their try region.
            let block_kind = func.blocks[current].kind;
            if current != func.entry
                && func.blocks[current].preds.is_empty()
                && !matches!(block_kind, BlockKind::CatchBody | BlockKind::FinallyBody)
            {
                self.processed.insert(current);
                return Ok(None);
            }

            self.processed.insert(current);
            self.emit_block_statements(current)?;

            let terminator = match func.blocks[current].terminator() {
                Some(t) => t.clone(),
                None => return Ok(None),
            };

            match terminator.kind {
                InstKind::Return { value } => {
                    self.emit_return(&value)?;
                    return Ok(None);
                }

                InstKind::Branch { target } => {
                    if Some(target) == stop {
                        return Ok(None);
                    }
                    if self.loop_end_stack.contains(&target) {
                        self.buf.line("break;");
                        return Ok(None);
                    }
                    let target_kind = func.blocks[target].kind;
                    match target_kind {
                        BlockKind::Merge | BlockKind::SwitchEnd | BlockKind::LoopEnd { .. } => {
                            return Ok(Some(target));
                        }
                        BlockKind::LoopBody { loop_id }
                            if !self.is_header_processed(loop_id) =>
                        {
                            // Entering a loop at its body: a post-test
                            // do/while.
                            let end = self.emit_do_loop(loop_id, target)?;
                            current = end;
                            continue;
                        }
                        _ => {
                            current = target;
                            continue;
                        }
                    }
                }

                InstKind::CondBranch {
                    cond,
                    then_block,
                    else_block,
                } => {
                    let then_kind = func.blocks[then_block].kind;
                    let else_kind = func.blocks[else_block].kind;

                    // While-style loop: body and end on the two edges of a
                    // header, matched by loop id.
                    if let (
                        BlockKind::LoopBody { loop_id: a },
                        BlockKind::LoopEnd { loop_id: b },
                    ) = (then_kind, else_kind)
                    {
                        if a == b {
                            let end =
                                self.emit_while(&cond, false, then_block, else_block)?;
                            current = end;
                            continue;
                        }
                    }
                    // Until-style: the branch sides are swapped.
                    if let (
                        BlockKind::LoopEnd { loop_id: a },
                        BlockKind::LoopBody { loop_id: b },
                    ) = (then_kind, else_kind)
                    {
                        if a == b {
                            let end =
                                self.emit_while(&cond, true, else_block, then_block)?;
                            current = end;
                            continue;
                        }
                    }

                    // If/then/else and if/then; anything else falls back to
                    // a raw if/else over the arm chains.
                    let cond_text = {
                        let mut visited = Vec::new();
                        self.emit_value(&cond, false, &mut visited)?
                    };

                    if matches!(then_kind, BlockKind::IfThen)
                        && !matches!(else_kind, BlockKind::IfElse)
                    {
                        // If without else: the false edge is the merge.
                        self.buf.open(format!("if ({})", cond_text));
                        let _ = self.emit_chain(then_block, None)?;
                        self.buf.close();
                        current = else_block;
                        continue;
                    }

                    self.buf.open(format!("if ({})", cond_text));
                    let after_then = self.emit_chain(then_block, None)?;
                    self.buf.close();
                    self.buf.open("else");
                    let after_else = self.emit_chain(else_block, None)?;
                    self.buf.close();

                    match after_then.or(after_else) {
                        Some(merge) => {
                            current = merge;
                            continue;
                        }
                        None => return Ok(None),
                    }
                }

                InstKind::Switch {
                    value,
                    arms,
                    default,
                } => {
                    let next = self.emit_switch(&value, &arms, default)?;
                    match next {
                        Some(block) => {
                            current = block;
                            continue;
                        }
                        None => return Ok(None),
                    }
                }

                _ => return Err(self.internal("non-terminator in terminator position")),
            }
        }
    }

    fn is_header_processed(&self, loop_id: u32) -> bool {
        self.func
            .blocks
            .iter_enumerated()
            .find(|(_, b)| b.kind == BlockKind::LoopHeader { loop_id })
            .map(|(id, _)| self.processed.contains(&id))
            .unwrap_or(true)
    }

    fn find_block(&self, kind: BlockKind) -> Option<BlockId> {
        self.func
            .blocks
            .iter_enumerated()
            .find(|(_, b)| b.kind == kind)
            .map(|(id, _)| id)
    }

    /// Emit a pre-test loop; returns the end block to continue from.
    fn emit_while(
        &mut self,
        cond: &Value,
        negate: bool,
        body: BlockId,
        end: BlockId,
    ) -> Result<BlockId> {
        let cond_text = {
            let mut visited = Vec::new();
            if negate {
                format!("!({})", self.emit_value(cond, false, &mut visited)?)
            } else {
                self.emit_value(cond, false, &mut visited)?
            }
        };

        self.buf.open(format!("while ({})", cond_text));
        self.loop_end_stack.push(end);
        let _ = self.emit_chain(body, None)?;
        self.loop_end_stack.pop();
        self.buf.close();
        Ok(end)
    }

    /// Emit a post-test do/while entered at its body; returns the end block.
    fn emit_do_loop(&mut self, loop_id: u32, body: BlockId) -> Result<BlockId> {
        let header = self
            .find_block(BlockKind::LoopHeader { loop_id })
            .ok_or_else(|| self.internal("do-loop body without header"))?;
        let end = self
            .find_block(BlockKind::LoopEnd { loop_id })
            .ok_or_else(|| self.internal("do-loop body without end"))?;

        self.buf.line("do");
        self.buf.line("{");
        self.buf.indent += 1;
        self.loop_end_stack.push(end);
        let _ = self.emit_chain(body, Some(header))?;
        self.loop_end_stack.pop();
        self.buf.indent -= 1;

        self.processed.insert(header);
        let terminator = self.func.blocks[header]
            .terminator()
            .cloned()
            .ok_or_else(|| self.internal("unterminated loop header"))?;
        match terminator.kind {
            InstKind::CondBranch {
                cond, then_block, ..
            } => {
                let mut visited = Vec::new();
                let cond_text = self.emit_value(&cond, false, &mut visited)?;
                // Until-style post-test loops put the end on the true edge.
                if then_block == end {
                    self.buf.line(format!("}} while (!({}));", cond_text));
                } else {
                    self.buf.line(format!("}} while ({});", cond_text));
                }
            }
            _ => return Err(self.internal("do-loop header without conditional branch")),
        }
        Ok(end)
    }

    /// Emit a switch; returns the block control continues at.
    fn emit_switch(
        &mut self,
        value: &Value,
        arms: &[SwitchArm],
        default: BlockId,
    ) -> Result<Option<BlockId>> {
        let scrutinee = {
            let mut visited = Vec::new();
            self.emit_value(value, false, &mut visited)?
        };

        self.buf.line(format!("switch ({})", scrutinee));
        self.buf.line("{");
        self.buf.indent += 1;

        let mut continuation: Option<BlockId> = None;

        for arm in arms {
            for case_value in &arm.values {
                self.buf.line(format!("case {}:", literal(case_value)));
            }
            self.buf.indent += 1;
            let ends_with_return = matches!(
                self.func.blocks[arm.target].terminator().map(|t| &t.kind),
                Some(InstKind::Return { .. })
            );
            let after = self.emit_chain(arm.target, None)?;
            continuation = continuation.or(after);
            if !ends_with_return {
                self.buf.line("break;");
            }
            self.buf.indent -= 1;
        }

        let default_kind = self.func.blocks[default].kind;
        if default_kind == BlockKind::SwitchDefault {
            self.buf.line("default:");
            self.buf.indent += 1;
            let ends_with_return = matches!(
                self.func.blocks[default].terminator().map(|t| &t.kind),
                Some(InstKind::Return { .. })
            );
            let after = self.emit_chain(default, None)?;
            continuation = continuation.or(after);
            if !ends_with_return {
                self.buf.line("break;");
            }
            self.buf.indent -= 1;
        } else {
            // No source default: a synthetic empty arm keeps the shape.
            self.buf.line("default:");
            self.buf.indent += 1;
            self.buf.line("break;");
            self.buf.indent -= 1;
            continuation = continuation.or(Some(default));
        }

        self.buf.indent -= 1;
        self.buf.line("}");
        Ok(continuation)
    }

    fn emit_try(&mut self, region_idx: usize) -> Result<()> {
        self.emitted_regions.insert(region_idx);
        let region = self.func.try_regions[region_idx].clone();

        self.buf.open("try");
        let _ = self.emit_chain(region.body, None)?;
        self.buf.close();

        for catch in &region.catches {
            let header = match (catch.var, catch.ty) {
                (Some(var), Some(ty)) => {
                    self.declared_emitted.insert(var);
                    format!(
                        "catch ({} {})",
                        type_name(self.types, ty),
                        sanitize_identifier(var.as_str())
                    )
                }
                (Some(var), None) => {
                    self.imports.insert("System".to_string());
                    self.declared_emitted.insert(var);
                    format!("catch (Exception {})", sanitize_identifier(var.as_str()))
                }
                (None, Some(ty)) => format!("catch ({})", type_name(self.types, ty)),
                (None, None) => "catch".to_string(),
            };
            self.buf.open(header);
            let _ = self.emit_chain(catch.block, None)?;
            self.buf.close();
        }

        if let Some(finally) = region.finally {
            self.buf.open("finally");
            let _ = self.emit_chain(finally, None)?;
            self.buf.close();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn emit_block_statements(&mut self, block_id: BlockId) -> Result<()> {
        let block: &BasicBlock = &self.func.blocks[block_id];
        let count = block.insts.len();
        for (idx, inst) in block.insts.iter().enumerate() {
            if idx + 1 == count && inst.is_terminator() {
                break;
            }
            if self.should_emit(inst) {
                let inst = inst.clone();
                self.emit_statement(&inst)?;
            }
        }
        Ok(())
    }

    /// The statement emission policy.
    fn should_emit(&self, inst: &Inst) -> bool {
        match &inst.kind {
            // Consumed by structured reconstruction.
            InstKind::Branch { .. }
            | InstKind::CondBranch { .. }
            | InstKind::Switch { .. }
            | InstKind::Return { .. } => false,

            InstKind::Label { .. } => false,
            InstKind::Comment(_) => self.config.emit_comments,

            // Assignments to temps are definitions for inlining, not
            // statements.
            InstKind::Assign { target, .. } => self.declared.contains(target),

            InstKind::Store { .. } | InstKind::ArrayStore { .. } | InstKind::FieldStore { .. } => {
                true
            }

            InstKind::Alloca { .. } | InstKind::Phi { .. } => false,

            InstKind::Throw { .. } | InstKind::Yield { .. } | InstKind::HandlerBind { .. } => true,

            // Calls: emit when the result lands in a declared identifier or
            // is entirely unused (a side-effect call); otherwise the use
            // site inlines it.
            InstKind::Call { .. }
            | InstKind::MethodCall { .. }
            | InstKind::BaseCall { .. }
            | InstKind::NewObject { .. }
            | InstKind::Await { .. } => match inst.result {
                Some(name) => {
                    self.declared.contains(&name)
                        || self.use_counts.get(&name).copied().unwrap_or(0) == 0
                }
                None => true,
            },

            // Other value producers only appear when their result is a
            // declared identifier; temps rely on inlining.
            _ => match inst.result {
                Some(name) => self.declared.contains(&name),
                None => true,
            },
        }
    }

    fn emit_statement(&mut self, inst: &Inst) -> Result<()> {
        let mut visited = Vec::new();
        match &inst.kind {
            InstKind::Assign { target, value } => {
                let value = self.emit_value(value, false, &mut visited)?;
                self.emit_assignment(*target, value);
            }

            InstKind::Store { addr, value } => {
                let addr = self.emit_value(addr, false, &mut visited)?;
                let value = self.emit_value(value, false, &mut visited)?;
                self.buf.line(format!("{} = {};", addr, value));
            }

            InstKind::ArrayStore {
                array,
                indices,
                value,
            } => {
                let array = self.emit_value(array, true, &mut visited)?;
                let indices = self.emit_values(indices, &mut visited)?;
                let value = self.emit_value(value, false, &mut visited)?;
                self.buf
                    .line(format!("{}[{}] = {};", array, indices.join(", "), value));
            }

            InstKind::FieldStore {
                object,
                field,
                value,
            } => {
                let object = self.emit_value(object, true, &mut visited)?;
                let value = self.emit_value(value, false, &mut visited)?;
                self.buf.line(format!(
                    "{}.{} = {};",
                    object,
                    sanitize_identifier(field.as_str()),
                    value
                ));
            }

            InstKind::Throw { value } => match value {
                Some(v) => {
                    let v = self.emit_value(v, false, &mut visited)?;
                    self.buf.line(format!("throw {};", v));
                }
                None => self.buf.line("throw;"),
            },

            InstKind::Yield { value } => match value {
                Some(v) => {
                    let v = self.emit_value(v, false, &mut visited)?;
                    self.buf.line(format!("yield return {};", v));
                }
                None => self.buf.line("yield break;"),
            },

            InstKind::HandlerBind {
                event,
                handler,
                add,
            } => {
                let event = self.emit_value(event, false, &mut visited)?;
                let handler = self.emit_value(handler, false, &mut visited)?;
                let op = if *add { "+=" } else { "-=" };
                self.buf.line(format!("{} {} {};", event, op, handler));
            }

            InstKind::Comment(text) => {
                self.buf.line(format!("// {}", text));
            }

            // Value producers reaching statement position either assign a
            // declared identifier or run for effect.
            _ => {
                let expr = self.emit_inst_expr(inst, false, &mut visited)?;
                match inst.result {
                    Some(name) if self.declared.contains(&name) => {
                        self.emit_assignment(name, expr);
                    }
                    _ => self.buf.line(format!("{};", expr)),
                }
            }
        }
        Ok(())
    }

    /// Assignment statement; the first assignment to a local doubles as its
    /// declaration.
    fn emit_assignment(&mut self, target: Symbol, value: String) {
        let is_local = self.func.locals.iter().any(|l| l.name == target);
        if is_local && !self.declared_emitted.contains(&target) {
            self.declared_emitted.insert(target);
            let ty = self
                .func
                .locals
                .iter()
                .find(|l| l.name == target)
                .map(|l| l.ty)
                .expect("local lookup");
            self.buf.line(format!(
                "{} {} = {};",
                type_name(self.types, ty),
                sanitize_identifier(target.as_str()),
                value
            ));
        } else {
            self.buf
                .line(format!("{} = {};", sanitize_identifier(target.as_str()), value));
        }
    }

    fn emit_return(&mut self, value: &Option<Value>) -> Result<()> {
        match value {
            Some(v) => {
                let mut visited = Vec::new();
                let text = self.emit_value(v, false, &mut visited)?;
                self.buf.line(format!("return {};", text));
            }
            None => self.buf.line("return;"),
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn emit_values(&mut self, values: &[Value], visited: &mut Vec<Symbol>) -> Result<Vec<String>> {
        values
            .iter()
            .map(|v| self.emit_value(v, false, visited))
            .collect()
    }

    /// Emit a value as expression text. `sub` marks sub-expression position
    /// and drives parenthesization.
    fn emit_value(&mut self, value: &Value, sub: bool, visited: &mut Vec<Symbol>) -> Result<String> {
        match value {
            Value::Constant(c) => Ok(literal(c)),
            Value::Ref(name) => {
                if self.declared.contains(name) {
                    return Ok(sanitize_identifier(name.as_str()));
                }
                if let Some(&(block, idx)) = self.temp_defs.get(name) {
                    // The visited set defeats accidental cycles.
                    if visited.contains(name) {
                        return Ok(sanitize_identifier(name.as_str()));
                    }
                    visited.push(*name);
                    let inst = self.func.blocks[block].insts[idx].clone();
                    let text = self.emit_inst_expr(&inst, sub, visited)?;
                    visited.pop();
                    return Ok(text);
                }
                // Class names, function references, externs: the name
                // itself.
                Ok(sanitize_dotted(name.as_str()))
            }
        }
    }

    /// Emit the defining expression of an instruction.
    fn emit_inst_expr(
        &mut self,
        inst: &Inst,
        sub: bool,
        visited: &mut Vec<Symbol>,
    ) -> Result<String> {
        match &inst.kind {
            InstKind::Binary { op, lhs, rhs } => {
                let l = self.emit_value(lhs, true, visited)?;
                let r = self.emit_value(rhs, true, visited)?;
                let token = self.binary_token(*op, inst.ty);
                let text = format!("{} {} {}", l, token, r);
                Ok(if sub { format!("({})", text) } else { text })
            }

            InstKind::Unary { op, operand } => {
                let x = self.emit_value(operand, true, visited)?;
                let text = match op {
                    UnaryOp::Neg => format!("-{}", x),
                    UnaryOp::Not => format!("!{}", x),
                    UnaryOp::BitwiseNot => format!("~{}", x),
                    UnaryOp::Inc => format!("{} + 1", x),
                    UnaryOp::Dec => format!("{} - 1", x),
                };
                Ok(if sub { format!("({})", text) } else { text })
            }

            InstKind::Compare { op, lhs, rhs } => {
                let l = self.emit_value(lhs, true, visited)?;
                let r = self.emit_value(rhs, true, visited)?;
                let token = match op {
                    CompareOp::Eq => "==",
                    CompareOp::Ne => "!=",
                    CompareOp::Lt => "<",
                    CompareOp::Le => "<=",
                    CompareOp::Gt => ">",
                    CompareOp::Ge => ">=",
                };
                let text = format!("{} {} {}", l, token, r);
                Ok(if sub { format!("({})", text) } else { text })
            }

            // A load is transparent: the address already is the expression.
            InstKind::Load { addr } => self.emit_value(addr, sub, visited),

            InstKind::GetElementPtr { base, indices } => {
                let base = self.emit_value(base, true, visited)?;
                let indices = self.emit_values(indices, visited)?;
                Ok(format!("{}[{}]", base, indices.join(", ")))
            }

            // An alloca is an address alias for a declared name.
            InstKind::Alloca { name } => {
                let stripped = name.as_str().strip_suffix("_addr").unwrap_or(name.as_str());
                Ok(sanitize_identifier(stripped))
            }

            InstKind::ArrayAlloc { elem, dims } => {
                let dims = self.emit_values(dims, visited)?;
                Ok(format!(
                    "new {}[{}]",
                    type_name(self.types, *elem),
                    dims.join(", ")
                ))
            }

            InstKind::Call { callee, args } => self.emit_call(*callee, args, visited),

            InstKind::MethodCall {
                object,
                method,
                args,
            } => {
                let object = self.emit_value(object, true, visited)?;
                let args = self.emit_values(args, visited)?;
                Ok(format!(
                    "{}.{}({})",
                    object,
                    sanitize_identifier(method.as_str()),
                    args.join(", ")
                ))
            }

            InstKind::BaseCall { method, args } => {
                let args = self.emit_values(args, visited)?;
                Ok(format!(
                    "base.{}({})",
                    sanitize_identifier(method.as_str()),
                    args.join(", ")
                ))
            }

            InstKind::NewObject { class, args } => {
                let args = self.emit_values(args, visited)?;
                Ok(format!(
                    "new {}({})",
                    type_name(self.types, *class),
                    args.join(", ")
                ))
            }

            InstKind::FieldAccess { object, field } => {
                let object = self.emit_value(object, true, visited)?;
                Ok(format!(
                    "{}.{}",
                    object,
                    sanitize_identifier(field.as_str())
                ))
            }

            InstKind::Cast { value, target, .. } => {
                let v = self.emit_value(value, true, visited)?;
                Ok(format!("({}){}", type_name(self.types, *target), v))
            }

            InstKind::Await { value } => {
                let v = self.emit_value(value, true, visited)?;
                let text = format!("await {}", v);
                Ok(if sub { format!("({})", text) } else { text })
            }

            // A phi in expression position takes its first incoming value;
            // the builder only places phis in merge blocks whose operands
            // agree.
            InstKind::Phi { incomings } => match incomings.first() {
                Some((v, _)) => self.emit_value(v, sub, visited),
                None => Err(self.internal("empty phi")),
            },

            _ => Err(self.internal(format!(
                "instruction is not an expression: {}",
                inst
            ))),
        }
    }

    fn emit_call(
        &mut self,
        callee: Symbol,
        args: &[Value],
        visited: &mut Vec<Symbol>,
    ) -> Result<String> {
        let args = self.emit_values(args, visited)?;

        // Tuple literals ride on a reserved callee name.
        if callee.eq_str("__tuple") {
            return Ok(format!("({})", args.join(", ")));
        }

        // Standard-library mapping comes first and may require imports and
        // support members.
        if let Some(def) = self.stdlib.get(callee) {
            for import in def.imports {
                self.imports.insert((*import).to_string());
            }
            if let Some(member) = def.support {
                if !self.support.contains(&member) {
                    self.support.push(member);
                }
            }
            return Ok(apply_template(def.template, &args));
        }

        // Extern declarations substitute their platform template.
        if let Some(ext) = self.module.externs.get(&callee) {
            let template = ext
                .templates
                .iter()
                .find(|(platform, _)| *platform == Platform::CSharp)
                .map(|(_, t)| t.clone());
            return match template {
                // Positional placeholders substitute the arguments;
                // otherwise the template is a callable name.
                Some(template) if template.contains("{0}") => {
                    Ok(apply_template(&template, &args))
                }
                Some(template) => Ok(format!("{}({})", template, args.join(", "))),
                None => Err(EmitError::Unsupported(format!(
                    "extern `{}` has no C# implementation",
                    callee
                ))),
            };
        }

        Ok(format!("{}({})", sanitize_dotted(callee.as_str()), args.join(", ")))
    }

    fn binary_token(&self, op: BinaryOp, ty: TypeId) -> &'static str {
        let boolean = self.types.is_boolean(ty);
        match op {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::IntDiv => "/",
            BinaryOp::And => {
                if boolean {
                    "&&"
                } else {
                    "&"
                }
            }
            BinaryOp::Or => {
                if boolean {
                    "||"
                } else {
                    "|"
                }
            }
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Concat => "+",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basc_ir::FunctionBuilder;
    use basc_util::Span;

    fn emit_module(module: &Module, types: &TypeTable, stdlib: &StdLib) -> String {
        let config = EmitterConfig::default();
        CsharpEmitter::new(module, types, stdlib, &config)
            .emit()
            .unwrap()
    }

    #[test]
    fn test_literals() {
        assert_eq!(literal(&ConstValue::Int(42)), "42");
        assert_eq!(literal(&ConstValue::Float(42.0)), "42.0");
        assert_eq!(literal(&ConstValue::Float(1.5)), "1.5");
        assert_eq!(literal(&ConstValue::Bool(true)), "true");
        assert_eq!(literal(&ConstValue::Null), "null");
        assert_eq!(literal(&ConstValue::Str("a\"b\n".into())), "\"a\\\"b\\n\"");
        assert_eq!(literal(&ConstValue::Char('\n')), "'\\n'");
    }

    #[test]
    fn test_type_names() {
        let mut types = TypeTable::new();
        assert_eq!(type_name(&types, types.integer()), "int");
        assert_eq!(type_name(&types, types.double()), "double");
        assert_eq!(type_name(&types, types.string()), "string");
        assert_eq!(type_name(&types, types.boolean()), "bool");

        let arr = types.array_of(types.integer(), 1);
        assert_eq!(type_name(&types, arr), "int[]");
        let arr2 = types.array_of(types.double(), 2);
        assert_eq!(type_name(&types, arr2), "double[,]");
        let nullable = types.nullable_of(types.integer());
        assert_eq!(type_name(&types, nullable), "int?");
    }

    /// A single BinaryOp feeding the return inlines into `return a + b;`
    /// with no temporary binding.
    #[test]
    fn test_temp_inlining_into_return() {
        let mut types = TypeTable::new();
        let stdlib = StdLib::new(&mut types);

        let mut b = FunctionBuilder::new(Symbol::intern("Add"), types.integer());
        b.add_param(Symbol::intern("a"), types.integer());
        b.add_param(Symbol::intern("b"), types.integer());
        let sum = b.emit_value(
            InstKind::Binary {
                op: BinaryOp::Add,
                lhs: Value::Ref(Symbol::intern("a")),
                rhs: Value::Ref(Symbol::intern("b")),
            },
            types.integer(),
            Span::DUMMY,
        );
        b.emit_effect(
            InstKind::Return { value: Some(sum) },
            types.void(),
            Span::DUMMY,
        );
        let mut func = b.build();
        basc_ir::analysis::rebuild_edges(&mut func);

        let mut module = Module::new();
        module.add_function(func);

        let out = emit_module(&module, &types, &stdlib);
        assert!(out.contains("return a + b;"), "output:\n{}", out);
        assert!(!out.contains("__t"), "temp leaked into output:\n{}", out);
    }

    /// Standard-library calls go through the template table and pull their
    /// imports in.
    #[test]
    fn test_stdlib_template_and_import() {
        let mut types = TypeTable::new();
        let stdlib = StdLib::new(&mut types);

        let mut b = FunctionBuilder::new(Symbol::intern("Hello"), types.void());
        b.emit_value(
            InstKind::Call {
                callee: Symbol::intern("PrintLine"),
                args: vec![Value::Constant(ConstValue::Str("hi".into()))],
            },
            types.void(),
            Span::DUMMY,
        );
        b.emit_effect(InstKind::Return { value: None }, types.void(), Span::DUMMY);
        let mut func = b.build();
        basc_ir::analysis::rebuild_edges(&mut func);

        let mut module = Module::new();
        module.add_function(func);

        let out = emit_module(&module, &types, &stdlib);
        assert!(out.contains("Console.WriteLine(\"hi\");"), "output:\n{}", out);
        assert!(out.contains("using System;"), "output:\n{}", out);
    }

    /// A trailing bare return in a void body is suppressed.
    #[test]
    fn test_void_return_suppressed() {
        let mut types = TypeTable::new();
        let stdlib = StdLib::new(&mut types);

        let mut b = FunctionBuilder::new(Symbol::intern("Empty"), types.void());
        b.emit_effect(InstKind::Return { value: None }, types.void(), Span::DUMMY);
        let mut func = b.build();
        basc_ir::analysis::rebuild_edges(&mut func);

        let mut module = Module::new();
        module.add_function(func);

        let out = emit_module(&module, &types, &stdlib);
        assert!(!out.contains("return;"), "output:\n{}", out);
    }

    /// Determinism: emitting the same module twice is byte-identical.
    #[test]
    fn test_deterministic_output() {
        let mut types = TypeTable::new();
        let stdlib = StdLib::new(&mut types);

        let mut b = FunctionBuilder::new(Symbol::intern("F"), types.integer());
        b.add_param(Symbol::intern("x"), types.integer());
        let doubled = b.emit_value(
            InstKind::Binary {
                op: BinaryOp::Mul,
                lhs: Value::Ref(Symbol::intern("x")),
                rhs: Value::Constant(ConstValue::Int(2)),
            },
            types.integer(),
            Span::DUMMY,
        );
        b.emit_effect(
            InstKind::Return {
                value: Some(doubled),
            },
            types.void(),
            Span::DUMMY,
        );
        let mut func = b.build();
        basc_ir::analysis::rebuild_edges(&mut func);

        let mut module = Module::new();
        module.add_function(func);

        let first = emit_module(&module, &types, &stdlib);
        let second = emit_module(&module, &types, &stdlib);
        assert_eq!(first, second);
    }
}
