pub mod nnrelay {
    pub mod v1 {
        tonic::include_proto!("nnrelay.v1");
    }
}

pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("nnrelay_descriptor");
