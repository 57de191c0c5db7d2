//! Resource and data source type definitions

pub mod cd_toolchain_tool;
pub mod en_destination;
pub mod is_lbs;
pub mod scc_report;

use carina_core::provider::ResourceType;
use carina_core::schema::ResourceSchema;

macro_rules! define_resource_type {
    ($name:ident, $type_name:expr, $schema:expr) => {
        pub struct $name;
        impl ResourceType for $name {
            fn name(&self) -> &'static str {
                $type_name
            }
            fn schema(&self) -> ResourceSchema {
                $schema
            }
        }
    };
}

define_resource_type!(
    EnDestinationServicenowType,
    "en_destination_servicenow",
    en_destination::resource_schema(&en_destination::SERVICENOW)
);
define_resource_type!(
    EnDestinationHuaweiType,
    "en_destination_huawei",
    en_destination::resource_schema(&en_destination::HUAWEI)
);
define_resource_type!(
    CdToolchainToolGithubconsolidatedType,
    cd_toolchain_tool::RESOURCE_TYPE,
    cd_toolchain_tool::resource_schema()
);

define_resource_type!(
    EnDestinationServicenowDataSource,
    "en_destination_servicenow",
    en_destination::data_source_schema(&en_destination::SERVICENOW)
);
define_resource_type!(
    EnDestinationHuaweiDataSource,
    "en_destination_huawei",
    en_destination::data_source_schema(&en_destination::HUAWEI)
);
define_resource_type!(
    SccReportViolationDriftDataSource,
    scc_report::DATA_SOURCE_TYPE,
    scc_report::data_source_schema()
);
define_resource_type!(IsLbsDataSource, is_lbs::DATA_SOURCE_TYPE, is_lbs::data_source_schema());

/// Returns all managed resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(EnDestinationServicenowType),
        Box::new(EnDestinationHuaweiType),
        Box::new(CdToolchainToolGithubconsolidatedType),
    ]
}

/// Returns all data source types supported by this provider
pub fn data_source_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(EnDestinationServicenowDataSource),
        Box::new(EnDestinationHuaweiDataSource),
        Box::new(SccReportViolationDriftDataSource),
        Box::new(IsLbsDataSource),
    ]
}
