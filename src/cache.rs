//! Workspace-level memoization of template compilations.
//!
//! Entries are keyed by document uri and validated against a SHA-256 of the markup,
//! options and view-model reflection, so an edited document recompiles and an
//! unchanged one is served from memory. The core pipeline stays pure; this is the
//! only shared state.

use dashmap::DashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::compile::{compile_template, CompileOptions, TemplateCompilation};
use crate::error::CompileResult;
use crate::plan::VmReflection;

/// One document of a workspace batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDocument {
    pub uri: String,
    pub source: String,
    #[serde(default)]
    pub options: CompileOptions,
}

struct CachedCompilation {
    hash: String,
    result: Arc<TemplateCompilation>,
}

#[derive(Default)]
pub struct CompilationCache {
    entries: DashMap<String, CachedCompilation>,
}

impl CompilationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute_hash(source: &str, options: &CompileOptions, reflection: &dyn VmReflection) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update([0u8]);
        hasher.update(reflection.root_type().as_bytes());
        hasher.update([0u8]);
        hasher.update(reflection.synthetic_prefix().as_bytes());
        hasher.update([0u8]);
        // Options that fail to serialize still hash their debug form.
        match serde_json::to_string(options) {
            Ok(json) => hasher.update(json.as_bytes()),
            Err(_) => hasher.update(format!("{:?}", options).as_bytes()),
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn get(
        &self,
        uri: &str,
        source: &str,
        options: &CompileOptions,
        reflection: &dyn VmReflection,
    ) -> Option<Arc<TemplateCompilation>> {
        let entry = self.entries.get(uri)?;
        if entry.hash == Self::compute_hash(source, options, reflection) {
            Some(Arc::clone(&entry.result))
        } else {
            None
        }
    }

    pub fn get_or_compile(
        &self,
        uri: &str,
        source: &str,
        options: &CompileOptions,
        reflection: &dyn VmReflection,
    ) -> CompileResult<Arc<TemplateCompilation>> {
        let hash = Self::compute_hash(source, options, reflection);
        if let Some(entry) = self.entries.get(uri) {
            if entry.hash == hash {
                debug!(uri, "cache hit");
                return Ok(Arc::clone(&entry.result));
            }
        }

        let result = match compile_template(source, options, reflection) {
            Ok(r) => Arc::new(r),
            Err(e) => {
                warn!(uri, error = %e, "template compilation faulted");
                return Err(e);
            }
        };
        debug!(uri, "cache miss");
        self.entries.insert(
            uri.to_string(),
            CachedCompilation {
                hash,
                result: Arc::clone(&result),
            },
        );
        Ok(result)
    }

    pub fn invalidate(&self, uri: &str) -> bool {
        self.entries.remove(uri).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compiles documents in parallel; results keep the input order.
    pub fn compile_batch(
        &self,
        documents: &[TemplateDocument],
        reflection: &(dyn VmReflection + Sync),
    ) -> Vec<CompileResult<Arc<TemplateCompilation>>> {
        documents
            .par_iter()
            .map(|doc| self.get_or_compile(&doc.uri, &doc.source, &doc.options, reflection))
            .collect()
    }
}
