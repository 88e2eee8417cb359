use std::time::Duration;

use anyhow::{bail, Context, Result};
use hydro_core::plant::{decode_plants, NewPlant, Plant, PlantSource};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

const PLANTS_PATH: &str = "/api/plants";

/// Blocking client for the plants REST API.
pub struct PlantsClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl PlantsClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|token| !token.trim().is_empty()),
        })
    }

    pub fn list_plants(&self) -> Result<Vec<Plant>> {
        let request = self.request(Method::GET, None);
        let entries: Vec<serde_json::Value> = self.send_json(request, "fetch plants")?;
        Ok(decode_plants(entries))
    }

    pub fn get_plant(&self, id: &str) -> Result<Plant> {
        let request = self.request(Method::GET, Some(id));
        self.send_json(request, "fetch plant")
    }

    pub fn add_plant(&self, plant: &NewPlant) -> Result<Plant> {
        let request = self.request(Method::POST, None).json(plant);
        self.send_json(request, "add plant")
    }

    pub fn update_plant(&self, id: &str, plant: &NewPlant) -> Result<Plant> {
        let request = self.request(Method::PUT, Some(id)).json(plant);
        self.send_json(request, "update plant")
    }

    pub fn delete_plant(&self, id: &str) -> Result<()> {
        let request = self.request(Method::DELETE, Some(id));
        self.send(request, "delete plant")?;
        Ok(())
    }

    pub(crate) fn endpoint(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}{}/{}", self.base_url, PLANTS_PATH, id),
            None => format!("{}{}", self.base_url, PLANTS_PATH),
        }
    }

    fn request(&self, method: Method, id: Option<&str>) -> RequestBuilder {
        let url = self.endpoint(id);
        debug!(%method, %url, "plants api request");
        let builder = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn send(&self, request: RequestBuilder, action: &str) -> Result<reqwest::blocking::Response> {
        let response = request.send().map_err(|err| {
            error!(action, error = %err, "plants api unreachable");
            err
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            error!(action, %status, body = %body, "plants api rejected request");
            bail!("failed to {action}: server answered {status}: {body}");
        }
        Ok(response)
    }

    fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, action: &str) -> Result<T> {
        let response = self.send(request, action)?;
        response
            .json()
            .with_context(|| format!("failed to decode response to {action}"))
    }
}

impl PlantSource for PlantsClient {
    fn plants(&self) -> Result<Vec<Plant>> {
        self.list_plants()
    }
}
