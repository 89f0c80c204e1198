use std::sync::Arc;

use optimizely::{
    api::{ApiClientConfig, OptimizelyApi},
    EventsConfig, Project,
};

pub fn main() {
    env_logger::init();

    let token = std::env::var("OPTIMIZELY_TOKEN").unwrap();
    let project_id: u64 = std::env::var("OPTIMIZELY_PROJECT_ID").unwrap().parse().unwrap();
    let client = ApiClientConfig::from_token(token).to_client().unwrap();

    // Download the datafile of the production environment and compile it.
    let datafile = client.get_datafile("production", project_id).unwrap();
    let project = Arc::new(Project::from_datafile(datafile).unwrap());

    // Bucket a user into every experiment during a single "request".
    let session = project.session("test-user");
    for key in project.experiment_keys() {
        let variation = session.get_variation(key);
        println!("{key}: {:?}", variation.as_ref().map(|v| v.key()));
    }

    // Report all impressions from the request in one batch.
    session.report(&EventsConfig::new(), &client).unwrap();
}
