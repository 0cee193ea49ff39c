//! End to end conversion
//!
//! Loads `data/api.tf` with the shipped configuration and compares the generated template.

use std::path::Path;
use tfsam::convert::{convert, ConvertError};
use tfsam::rules::Config;
use tfsam::terraform::TerraformDocuments;

fn crate_dir() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR"))
}

fn load(file: &str) -> tfsam::Resources {
    let mut documents = TerraformDocuments::default();
    documents
        .load_file(&crate_dir().join("tests/data").join(file))
        .expect("fixture must load");
    documents.into_resources()
}

fn config() -> Config {
    Config::load_directory(&crate_dir().join("config")).expect("shipped configuration loads")
}

#[test]
fn api() {
    let template = convert(&config(), load("api.tf"), None).expect("conversion succeeds");

    insta::assert_json_snapshot!("api", template);
}

#[test]
fn filter_keeps_merges_of_the_selected_resources() {
    let filter = regex::Regex::new("aws_lambda_function").unwrap();
    let template = convert(&config(), load("api.tf"), Some(&filter)).expect("conversion succeeds");

    assert_eq!(
        template.resources.keys().collect::<Vec<_>>(),
        vec!["FooBarApiServerlessFunction", "FooBarApiServerlessFunctionLogGroup"]
    );
    let events = &template.resources["FooBarApiServerlessFunction"].properties["Events"];
    pretty_assertions::assert_eq!(
        events.to_json(),
        serde_json::json!({
            "FooIntegrationFooBarResourceANYInt": {
                "Type": "Api",
                "Properties": {
                    "Method": "ANY",
                    "Path": "/bar/{proxy+}",
                    "RestApiId": {"Ref": "FooServerlessApi"}
                }
            }
        })
    );
}

#[test]
fn everything_filtered_is_an_error() {
    let filter = regex::Regex::new("aws_dynamodb_table").unwrap();

    assert!(matches!(
        convert(&config(), load("api.tf"), Some(&filter)),
        Err(ConvertError::NothingToWrite)
    ));
}
