/// Resource registry and apply loop for a single stack
pub mod output;

pub use output::Output;

use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::StackError;

/// Stable identifier of a registered resource
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Urn(String);

impl Urn {
    pub fn new(stack: &str, kind: &str, name: &str) -> Self {
        Self(format!("urn:{}:{}::{}", stack, kind, name))
    }

    /// Resource name segment
    pub fn name(&self) -> &str {
        self.0.rsplit("::").next().unwrap_or(&self.0)
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kinds of resources a stack can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Network,
    Firewall,
    KubernetesCluster,
    KubernetesProvider,
    HelmRelease,
    Component(&'static str),
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Network => write!(f, "civo:network"),
            ResourceKind::Firewall => write!(f, "civo:firewall"),
            ResourceKind::KubernetesCluster => write!(f, "civo:kubernetes-cluster"),
            ResourceKind::KubernetesProvider => write!(f, "kubernetes:provider"),
            ResourceKind::HelmRelease => write!(f, "kubernetes:helm-release"),
            ResourceKind::Component(token) => write!(f, "{}", token),
        }
    }
}

/// A registered resource and the deferred value it produces
pub struct Resource<T> {
    pub urn: Urn,
    pub output: Output<T>,
}

/// What the stack remembers about each registered resource
#[derive(Clone)]
pub struct ResourceRecord {
    pub urn: Urn,
    pub kind: ResourceKind,
    pub parent: Option<Urn>,
    pub dependencies: BTreeSet<Urn>,
    completion: Output<()>,
}

struct Export {
    value: Output<String>,
    secret: bool,
}

/// Resolved stack outputs after a successful apply
#[derive(Debug, Clone, Default)]
pub struct StackOutputs {
    pub values: BTreeMap<String, String>,
    pub secrets: BTreeSet<String>,
}

impl StackOutputs {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Output value for display, with secrets masked
    pub fn display_value(&self, name: &str) -> Option<String> {
        if self.secrets.contains(name) {
            return self.values.get(name).map(|_| "[secret]".to_string());
        }
        self.values.get(name).cloned()
    }
}

/// A set of declared resources evaluated together
pub struct Stack {
    name: String,
    resources: Mutex<Vec<ResourceRecord>>,
    exports: Mutex<BTreeMap<String, Export>>,
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Mutex::new(Vec::new()),
            exports: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a resource whose realized value is `value`.
    ///
    /// The resource depends on whatever `value` was derived from; the
    /// returned output depends only on the new resource.
    pub fn register<T>(
        &self,
        kind: ResourceKind,
        name: &str,
        parent: Option<&Urn>,
        value: Output<T>,
    ) -> Result<Resource<T>, StackError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let urn = Urn::new(&self.name, &kind.to_string(), name);

        let mut resources = self.resources.lock().expect("resource registry poisoned");
        if resources.iter().any(|r| r.urn == urn) {
            return Err(StackError::DuplicateResource(urn.to_string()));
        }

        debug!("Registering {} (depends on {:?})", urn, value.dependencies());

        resources.push(ResourceRecord {
            urn: urn.clone(),
            kind,
            parent: parent.cloned(),
            dependencies: value.dependencies().clone(),
            completion: value.map(|_| ()),
        });

        let output = value.with_dependencies([urn.clone()].into_iter().collect());
        Ok(Resource { urn, output })
    }

    /// Publish a named stack output
    pub fn export(&self, name: &str, value: Output<String>) {
        self.insert_export(name, value, false);
    }

    /// Publish a named stack output that must not be echoed in logs
    pub fn export_secret(&self, name: &str, value: Output<String>) {
        self.insert_export(name, value, true);
    }

    fn insert_export(&self, name: &str, value: Output<String>, secret: bool) {
        self.exports
            .lock()
            .expect("export table poisoned")
            .insert(name.to_string(), Export { value, secret });
    }

    /// Snapshot of registered resources in registration order
    pub fn resources(&self) -> Vec<ResourceRecord> {
        self.resources
            .lock()
            .expect("resource registry poisoned")
            .clone()
    }

    /// Resources ordered so that parents and dependencies come first
    pub fn creation_order(&self) -> Vec<ResourceRecord> {
        let records = self.resources();
        let index: HashMap<&Urn, usize> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (&r.urn, i))
            .collect();

        let mut pending: Vec<usize> = vec![0; records.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
        for (i, record) in records.iter().enumerate() {
            for upstream in record.dependencies.iter().chain(record.parent.iter()) {
                if let Some(&j) = index.get(upstream) {
                    pending[i] += 1;
                    dependents[j].push(i);
                }
            }
        }

        // Kahn's algorithm, always taking the earliest-registered ready node
        let mut ready: BTreeSet<usize> = (0..records.len()).filter(|&i| pending[i] == 0).collect();
        let mut order = Vec::with_capacity(records.len());
        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &d in &dependents[i] {
                pending[d] -= 1;
                if pending[d] == 0 {
                    ready.insert(d);
                }
            }
        }

        order.into_iter().map(|i| records[i].clone()).collect()
    }

    /// Resources ordered so that dependents and children go first
    pub fn teardown_order(&self) -> Vec<ResourceRecord> {
        let mut order = self.creation_order();
        order.reverse();
        order
    }

    /// Realize every registered resource and resolve the exports.
    ///
    /// Independent resources make progress concurrently; deferred outputs
    /// hold back anything whose inputs are not ready yet. The first failure
    /// in creation order aborts the run.
    pub async fn apply(&self) -> Result<StackOutputs, StackError> {
        let order = self.creation_order();
        info!("Applying stack {} ({} resources)", self.name, order.len());

        let results = join_all(order.iter().map(|r| r.completion.resolve())).await;

        let mut first_failure = None;
        for (record, result) in order.iter().zip(results) {
            match result {
                Ok(()) => debug!("✓ {}", record.urn),
                Err(e) => {
                    error!("✗ {}: {}", record.urn, e);
                    first_failure.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_failure {
            return Err(e);
        }

        let exports: Vec<(String, Output<String>, bool)> = self
            .exports
            .lock()
            .expect("export table poisoned")
            .iter()
            .map(|(name, export)| (name.clone(), export.value.clone(), export.secret))
            .collect();

        let mut outputs = StackOutputs::default();
        for (name, value, secret) in exports {
            outputs.values.insert(name.clone(), value.resolve().await?);
            if secret {
                outputs.secrets.insert(name);
            }
        }

        info!("Stack {} applied", self.name);
        Ok(outputs)
    }
}
