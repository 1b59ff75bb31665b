#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IOName(pub String);

impl std::fmt::Display for IOName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug)]
pub struct TensorSpec {
    pub name: IOName,
    pub dtype: super::DType,
    pub rank: usize,
    pub dims: Vec<Option<usize>>, // None = dynamic
}

#[derive(Clone, Debug, Default)]
pub struct ModelSpec {
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
}

impl ModelSpec {
    pub fn input(&self, name: &IOName) -> Option<&TensorSpec> {
        self.inputs.iter().find(|spec| &spec.name == name)
    }
}
