pub mod calibration;
pub mod classifier_trait;
pub mod ensemble;
pub mod factory;
pub mod gbdt;
