#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use nnrelay_core::{
    Backend, BackendModel, DType, Device, IOName, ModelArtifact, ModelSpec, NamedTensor,
    TensorData, TensorSpec,
};
use parking_lot::Mutex;

pub const ADD_GRAPH: &[u8] = b"add";

fn f32_spec(name: &str) -> TensorSpec {
    TensorSpec {
        name: IOName(name.to_string()),
        dtype: DType::F32,
        rank: 1,
        dims: vec![None],
    }
}

/// Loads graphs whose descriptor reads `add` and sums inputs `0` and `1`.
#[derive(Default)]
pub struct AddBackend {
    pub loads: Arc<AtomicUsize>,
}

pub struct AddModel {
    spec: ModelSpec,
}

impl AddModel {
    fn new() -> Self {
        Self {
            spec: ModelSpec {
                inputs: vec![f32_spec("0"), f32_spec("1")],
                outputs: vec![f32_spec("sum")],
            },
        }
    }
}

impl Backend for AddBackend {
    type Model = AddModel;

    fn name(&self) -> &'static str {
        "add"
    }

    fn load(&self, artifact: &ModelArtifact, _device: &Device) -> Result<Self::Model> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let graph = std::fs::read(&artifact.paths.graph)
            .with_context(|| format!("missing graph {}", artifact.paths.graph.display()))?;
        ensure!(graph == ADD_GRAPH, "unsupported graph");
        Ok(AddModel::new())
    }
}

impl BackendModel for AddModel {
    fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    fn infer(&mut self, inputs: Vec<NamedTensor>) -> Result<Vec<NamedTensor>> {
        let lhs = find_f32(&inputs, "0")?;
        let rhs = find_f32(&inputs, "1")?;
        let shape = &inputs
            .iter()
            .find(|t| t.name.0 == "0")
            .context("missing input 0")?
            .shape;
        ensure!(
            lhs.len() == rhs.len() && lhs.len() == shape.numel(),
            "shape mismatch: {} vs {} for {:?}",
            lhs.len(),
            rhs.len(),
            shape.dims()
        );

        let sum = lhs.iter().zip(rhs).map(|(a, b)| a + b).collect();
        Ok(vec![NamedTensor::new("sum", shape.dims(), TensorData::F32(sum))])
    }
}

fn find_f32<'a>(inputs: &'a [NamedTensor], name: &str) -> Result<&'a [f32]> {
    let tensor = inputs
        .iter()
        .find(|t| t.name.0 == name)
        .with_context(|| format!("missing input {name}"))?;
    match &tensor.data {
        TensorData::F32(values) => Ok(values),
        other => bail!("input {name} has dtype {}", other.dtype()),
    }
}

/// Blocks inside `load` until the test opens the gate.
pub struct GatedBackend {
    gate: Mutex<mpsc::Receiver<()>>,
}

impl GatedBackend {
    pub fn new() -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (Self { gate: Mutex::new(rx) }, tx)
    }
}

impl Backend for GatedBackend {
    type Model = AddModel;

    fn name(&self) -> &'static str {
        "gated"
    }

    fn load(&self, _artifact: &ModelArtifact, _device: &Device) -> Result<Self::Model> {
        self.gate
            .lock()
            .recv_timeout(Duration::from_secs(10))
            .context("gate never opened")?;
        Ok(AddModel::new())
    }
}

/// Each `load` blocks until the test sends its outcome: `true` loads the
/// add model, `false` fails.
pub struct ScriptedBackend {
    outcomes: Mutex<mpsc::Receiver<bool>>,
    pub loads: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new() -> (Self, mpsc::Sender<bool>) {
        let (tx, rx) = mpsc::channel();
        let backend = Self {
            outcomes: Mutex::new(rx),
            loads: Arc::default(),
        };
        (backend, tx)
    }
}

impl Backend for ScriptedBackend {
    type Model = AddModel;

    fn name(&self) -> &'static str {
        "scripted"
    }

    fn load(&self, _artifact: &ModelArtifact, _device: &Device) -> Result<Self::Model> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let ok = self
            .outcomes
            .lock()
            .recv_timeout(Duration::from_secs(10))
            .context("no outcome scripted")?;
        ensure!(ok, "scripted load failure");
        Ok(AddModel::new())
    }
}

pub struct FailingBackend;

impl Backend for FailingBackend {
    type Model = AddModel;

    fn name(&self) -> &'static str {
        "failing"
    }

    fn load(&self, _artifact: &ModelArtifact, _device: &Device) -> Result<Self::Model> {
        bail!("backend refused the graph")
    }
}

pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn f32_values(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
