use anyhow::{bail, ensure, Context, Result};
use half::f16;
use nnrelay_core::{
    Backend, BackendModel, DType, Device, IOName, ModelArtifact, ModelSpec, NamedTensor, Shape,
    TensorData, TensorSpec,
};
use ort::{
    session::{builder::SessionBuilder, Session, SessionInputValue},
    tensor::TensorElementType,
    value::{DynValue, ValueType},
};
use tracing::debug;

pub struct OrtBackend;

impl OrtBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OrtBackend {
    fn default() -> Self {
        Self::new()
    }
}

pub struct OrtModel {
    spec: ModelSpec,
    session: Session,
}

impl Backend for OrtBackend {
    type Model = OrtModel;

    fn name(&self) -> &'static str {
        "onnxruntime"
    }

    /// Loads the graph file; external weight data referenced by the graph is
    /// resolved by ONNX Runtime relative to the graph's directory.
    fn load(&self, artifact: &ModelArtifact, device: &Device) -> Result<Self::Model> {
        let graph = &artifact.paths.graph;
        ensure!(graph.is_file(), "graph {} has not been uploaded", graph.display());
        debug!(
            model = %artifact.model_id,
            quantization = artifact.quantization,
            "quantization hint ignored by onnxruntime"
        );

        let builder = Session::builder()
            .context("failed to create ORT session builder")?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .context("failed to configure ORT session builder")?;

        let builder = configure_session_builder(builder, device)?;

        let session = builder
            .commit_from_file(graph)
            .context("failed to load ONNX model")?;

        let spec = build_model_spec(&session)?;

        Ok(OrtModel { spec, session })
    }
}

impl BackendModel for OrtModel {
    fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    fn infer(&mut self, inputs: Vec<NamedTensor>) -> Result<Vec<NamedTensor>> {
        ensure!(
            inputs.len() == self.spec.inputs.len(),
            "expected {} inputs, got {}",
            self.spec.inputs.len(),
            inputs.len()
        );

        let mut ort_inputs = Vec::with_capacity(inputs.len());
        for input in inputs {
            let spec = self
                .spec
                .input(&input.name)
                .with_context(|| format!("model has no input named {}", input.name))?;
            ensure!(
                spec.dtype == input.data.dtype(),
                "input {} expects {}, got {}",
                input.name,
                spec.dtype,
                input.data.dtype()
            );
            let name = input.name.0.clone();
            let value = tensor_to_ort_value(input)?;
            ort_inputs.push((name, SessionInputValue::from(value)));
        }

        let outputs = self.session.run(ort_inputs)?;
        let mut out_tensors = Vec::with_capacity(outputs.len());
        for (name, value) in outputs.iter() {
            out_tensors.push(ort_value_to_tensor(name, &value)?);
        }

        Ok(out_tensors)
    }
}

fn build_model_spec(session: &Session) -> Result<ModelSpec> {
    let inputs = session
        .inputs
        .iter()
        .map(|input| tensor_spec_from_value_type(&input.name, &input.input_type))
        .collect::<Result<Vec<_>>>()?;

    let outputs = session
        .outputs
        .iter()
        .map(|output| tensor_spec_from_value_type(&output.name, &output.output_type))
        .collect::<Result<Vec<_>>>()?;

    Ok(ModelSpec { inputs, outputs })
}

fn configure_session_builder(builder: SessionBuilder, device: &Device) -> Result<SessionBuilder> {
    match device {
        Device::Cpu => Ok(builder),
        Device::Cuda { device_id } => configure_cuda(builder, *device_id),
    }
}

fn configure_cuda(builder: SessionBuilder, device_id: u32) -> Result<SessionBuilder> {
    #[cfg(feature = "cuda")]
    {
        use ort::execution_providers::cuda::CUDAExecutionProvider;
        let ep = CUDAExecutionProvider::default()
            .with_device_id(device_id as i32)
            .build();
        builder
            .with_execution_providers([ep])
            .context("failed to enable ORT CUDA execution provider")
    }
    #[cfg(not(feature = "cuda"))]
    {
        let _ = (builder, device_id);
        bail!("CUDA requested but nnrelay-backend-ort was built without the `cuda` feature")
    }
}

fn tensor_spec_from_value_type(name: &str, value_type: &ValueType) -> Result<TensorSpec> {
    let ValueType::Tensor { ty, shape, .. } = value_type else {
        bail!("unsupported non-tensor IO value type");
    };

    let dtype = ort_tensor_element_to_dtype(*ty)?;
    let dims = shape
        .iter()
        .map(|d| if *d < 0 { None } else { Some(*d as usize) })
        .collect::<Vec<_>>();

    Ok(TensorSpec {
        name: IOName(name.to_string()),
        dtype,
        rank: shape.len(),
        dims,
    })
}

fn ort_tensor_element_to_dtype(ty: TensorElementType) -> Result<DType> {
    match ty {
        TensorElementType::Int8 => Ok(DType::I8),
        TensorElementType::Float16 => Ok(DType::F16),
        TensorElementType::Float32 => Ok(DType::F32),
        TensorElementType::Float64 => Ok(DType::F64),
        TensorElementType::Int16 => Ok(DType::I16),
        TensorElementType::Int32 => Ok(DType::I32),
        TensorElementType::Int64 => Ok(DType::I64),
        TensorElementType::Uint8 => Ok(DType::U8),
        TensorElementType::Uint16 => Ok(DType::U16),
        TensorElementType::Uint32 => Ok(DType::U32),
        TensorElementType::Uint64 => Ok(DType::U64),
        _ => bail!("unsupported tensor element type: {ty}"),
    }
}

fn tensor_to_ort_value(tensor: NamedTensor) -> Result<DynValue> {
    let shape: Vec<usize> = tensor.shape.dims().to_vec();
    ensure!(
        tensor.data.len() == tensor.shape.numel(),
        "input {} has {} elements, shape {:?} needs {}",
        tensor.name,
        tensor.data.len(),
        shape,
        tensor.shape.numel()
    );

    let value = match tensor.data {
        TensorData::I8(data) => ort::value::Tensor::from_array((shape, data))?.into_dyn(),
        TensorData::F16(data) => ort::value::Tensor::from_array((shape, data))?.into_dyn(),
        TensorData::F32(data) => ort::value::Tensor::from_array((shape, data))?.into_dyn(),
        TensorData::F64(data) => ort::value::Tensor::from_array((shape, data))?.into_dyn(),
        TensorData::I16(data) => ort::value::Tensor::from_array((shape, data))?.into_dyn(),
        TensorData::I32(data) => ort::value::Tensor::from_array((shape, data))?.into_dyn(),
        TensorData::I64(data) => ort::value::Tensor::from_array((shape, data))?.into_dyn(),
        TensorData::U8(data) => ort::value::Tensor::from_array((shape, data))?.into_dyn(),
        TensorData::U16(data) => ort::value::Tensor::from_array((shape, data))?.into_dyn(),
        TensorData::U32(data) => ort::value::Tensor::from_array((shape, data))?.into_dyn(),
        TensorData::U64(data) => ort::value::Tensor::from_array((shape, data))?.into_dyn(),
    };

    Ok(value)
}

macro_rules! extract {
    ($value:expr, $ty:ty, $variant:ident) => {{
        let array = $value.try_extract_array::<$ty>()?;
        let values = match array.as_slice() {
            Some(slice) => slice.to_vec(),
            None => array.iter().copied().collect(),
        };
        TensorData::$variant(values)
    }};
}

fn ort_value_to_tensor(name: &str, value: &ort::value::ValueRef<'_>) -> Result<NamedTensor> {
    let ValueType::Tensor { ty, shape, .. } = value.dtype() else {
        bail!("non-tensor output {name} is not supported");
    };

    let dims: Vec<usize> = shape.iter().map(|d| (*d).max(0) as usize).collect();

    let data = match *ty {
        TensorElementType::Int8 => extract!(value, i8, I8),
        TensorElementType::Float16 => extract!(value, f16, F16),
        TensorElementType::Float32 => extract!(value, f32, F32),
        TensorElementType::Float64 => extract!(value, f64, F64),
        TensorElementType::Int16 => extract!(value, i16, I16),
        TensorElementType::Int32 => extract!(value, i32, I32),
        TensorElementType::Int64 => extract!(value, i64, I64),
        TensorElementType::Uint8 => extract!(value, u8, U8),
        TensorElementType::Uint16 => extract!(value, u16, U16),
        TensorElementType::Uint32 => extract!(value, u32, U32),
        TensorElementType::Uint64 => extract!(value, u64, U64),
        _ => bail!("unsupported output tensor element type: {ty}"),
    };

    Ok(NamedTensor {
        name: IOName(name.to_string()),
        shape: Shape::from_slice(&dims),
        data,
    })
}
