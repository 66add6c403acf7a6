//! In-memory function host for development and testing

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

use crate::{FunctionHost, FunctionPackage, PackageError};

/// An upload as seen by the host
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRecord {
    pub target: String,
    pub function_name: String,
    pub files: Vec<String>,
    pub size_bytes: usize,
}

#[derive(Debug, Default)]
struct HostState {
    unhealthy: HashSet<String>,
    status_checks: Vec<String>,
    uploads: Vec<UploadRecord>,
}

/// Function host where every target is healthy unless marked otherwise
#[derive(Debug, Clone, Default)]
pub struct InMemoryFunctionHost {
    state: Arc<Mutex<HostState>>,
}

impl InMemoryFunctionHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_unhealthy(&self, target: &str) {
        self.state.lock().unhealthy.insert(target.to_string());
    }

    pub fn mark_healthy(&self, target: &str) {
        self.state.lock().unhealthy.remove(target);
    }

    /// Targets probed so far, in call order
    pub fn status_checks(&self) -> Vec<String> {
        self.state.lock().status_checks.clone()
    }

    pub fn uploads(&self) -> Vec<UploadRecord> {
        self.state.lock().uploads.clone()
    }
}

#[async_trait]
impl FunctionHost for InMemoryFunctionHost {
    async fn is_healthy(&self, target: &str) -> Result<bool, PackageError> {
        let mut state = self.state.lock();
        state.status_checks.push(target.to_string());
        Ok(!state.unhealthy.contains(target))
    }

    async fn upload(&self, target: &str, package: &FunctionPackage) -> Result<(), PackageError> {
        let mut state = self.state.lock();
        if state.unhealthy.contains(target) {
            return Err(PackageError::Host(format!("{} is not accepting deployments", target)));
        }
        state.uploads.push(UploadRecord {
            target: target.to_string(),
            function_name: package.function_name().to_string(),
            files: package.files().map(|(path, _)| path.to_string()).collect(),
            size_bytes: package.size_bytes(),
        });
        Ok(())
    }
}
