//! 编译模块：将原始规则编译为可执行的正则模式
pub mod pattern;
pub mod compiler;
pub mod regex_fixer;

pub use self::pattern::{
    CompileWarning, CompiledPattern, CompiledRuleLibrary, CompiledTechRule, ImpliedRef, SignalType,
};
pub use self::compiler::{CompileStats, ParsedRule, RuleCompiler};
pub use self::regex_fixer::RegexFixer;
