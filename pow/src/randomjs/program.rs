//! Program synthesis
//!
//! `key -> program text`, deterministic: the generator is seeded from the key
//! and the scope arena is fresh for every program.

use tracing::trace;

use crate::randomjs::ast::{Expr, ProgramTree, Statement};
use crate::randomjs::blake2b::{Blake2Generator, Key};
use crate::randomjs::config::{GrammarTables, ProgramOptions};
use crate::randomjs::error::TableError;
use crate::randomjs::generator::Generator;
use crate::randomjs::globals::GlobalHelper;
use crate::randomjs::metrics::ComplexityMetrics;
use crate::randomjs::scope::ScopeTree;

/// Synthesized program
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    bytes: Vec<u8>,
    key: Key,
    metrics: ComplexityMetrics,
}

impl Program {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn metrics(&self) -> ComplexityMetrics {
        self.metrics
    }

    /// Program text; generated programs are pure ASCII
    pub fn text(&self) -> &str {
        core::str::from_utf8(&self.bytes).unwrap_or_default()
    }
}

/// Tree and scope arena of one synthesis run
#[derive(Debug, Clone)]
pub struct GeneratedProgram {
    pub tree: ProgramTree,
    pub scopes: ScopeTree,
}

/// Program synthesizer holding the validated generator tables
#[derive(Debug, Clone)]
pub struct ProgramFactory {
    options: ProgramOptions,
    tables: GrammarTables,
}

impl ProgramFactory {
    pub fn new(options: ProgramOptions) -> Result<Self, TableError> {
        let tables = GrammarTables::from_options(&options)?;
        Ok(Self { options, tables })
    }

    pub fn options(&self) -> &ProgramOptions {
        &self.options
    }

    /// Build the program tree for `key`
    pub fn build(&self, key: &Key) -> Result<GeneratedProgram, TableError> {
        let options = &self.options;
        let mut gen = Generator::new(Blake2Generator::from_key(key), &self.tables, options);
        let root = gen.scopes().root();
        gen.scopes_mut().require(root, GlobalHelper::Output);

        let global_count = gen.count(options.globals_min, options.globals_max);
        let mut globals = Vec::with_capacity(global_count as usize);
        for _ in 0..global_count {
            globals.push(gen.declaration(root, options.max_depth)?);
        }

        let statement_count = gen.count(options.statements_min, options.statements_max);
        let mut body = Vec::with_capacity(statement_count as usize);
        for _ in 0..statement_count {
            body.push(gen.statement(root, options.max_depth)?);
        }

        let outputs = globals
            .iter()
            .filter_map(|statement| match statement {
                Statement::Declaration { name, .. } => {
                    Some(Statement::Output(Expr::Variable(name.clone())))
                }
                _ => None,
            })
            .collect();

        let scopes = gen.into_scopes();
        let tree = ProgramTree {
            helpers: scopes.required().collect(),
            globals,
            body,
            outputs,
        };
        Ok(GeneratedProgram { tree, scopes })
    }

    /// Synthesize the program for `key`
    pub fn generate(&self, key: &Key) -> Result<Program, TableError> {
        let generated = self.build(key)?;
        let metrics = ComplexityMetrics::measure(&generated.tree);
        let bytes = generated.tree.render(self.options.max_call_depth).into_bytes();
        trace!(%key, len = bytes.len(), cyclomatic = metrics.cyclomatic, "program synthesized");
        Ok(Program {
            bytes,
            key: *key,
            metrics,
        })
    }
}
