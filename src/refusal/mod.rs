pub mod codes;

pub use codes::{
    BadConfigDetail, BadInputDetail, PipelineFaultDetail, RefusalBody, RefusalCode, RefusalDetail,
    RefusalEnvelope, build_envelope,
};
