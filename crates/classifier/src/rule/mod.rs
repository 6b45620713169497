//! 룰 모듈 -- 룰 파일 로딩과 정규식 컴파일
//!
//! # 흐름
//! ```text
//! rules.yaml --RuleLoader--> Vec<Rule> --CompiledRules::compile--> CompiledRules
//! ```

pub mod compiler;
pub mod loader;

pub use compiler::{CompiledMatcher, CompiledRules, RuleMatch, compile_rule};
pub use loader::RuleLoader;
