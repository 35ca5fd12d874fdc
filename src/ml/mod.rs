pub mod inference;
pub mod ml_model;

pub use inference::{CpuBackend, InferenceEngine};
pub use ml_model::{
    conv_output_size, export_model, prepare_image, BreedClassifier, ModelConfig,
    SERVING_IMAGE_SIZE, TEMPLATE_IMAGE_SIZE, TEMPLATE_NUM_CLASSES,
};
