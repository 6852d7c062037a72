//! Resource DTOs

use serde::Deserialize;
use validator::Validate;

use domain_resources::ResourceKind;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterResourceRequest {
    pub kind: ResourceKind,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub initial_stock: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RestockRequest {
    #[validate(range(min = 1))]
    pub quantity: i64,
    #[validate(length(min = 1, max = 200))]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct MaintenanceRequest {
    pub maintenance: bool,
}
