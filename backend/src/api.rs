use std::{collections::BTreeMap, time::Duration};

use actix_cors::Cors;
use actix_web::{
    get,
    http::header,
    post,
    web::{self, Data},
    App, HttpServer, Responder,
};
use common::req::{IngestResponse, LatestValue, MeasurementField, RawReading, SeriesResponse};
use log::info;

use crate::{
    aggregate,
    config::{AggregationConfig, Config},
    db::ReadingStore,
    error::Error,
    gateway::Gateway,
    latest,
};

#[derive(Clone)]
pub struct AppState {
    pub store: ReadingStore,
    pub gateway: Gateway,
    pub aggregation: AggregationConfig,
}

impl AppState {
    pub fn new(store: ReadingStore, aggregation: AggregationConfig) -> Self {
        Self {
            gateway: Gateway::new(store.clone()),
            store,
            aggregation,
        }
    }

    fn window(&self, query: &WindowQuery) -> Result<Duration, Error> {
        match query.window_minutes {
            Some(minutes) if minutes > 0 => minutes
                .checked_mul(60)
                .map(Duration::from_secs)
                .ok_or(Error::InvalidWindow(minutes)),
            _ => Ok(self.aggregation.window),
        }
    }
}

#[derive(serde::Deserialize, Debug)]
struct WindowQuery {
    window_minutes: Option<u64>,
}

#[post("/sensor")]
async fn api_ingest(
    reading: web::Json<RawReading>,
    state: Data<AppState>,
) -> Result<impl Responder, Error> {
    let id = state.gateway.ingest(reading.into_inner()).await?;
    Ok(web::Json(IngestResponse {
        message: "Data received and stored successfully".to_owned(),
        id,
    }))
}

#[get("/last_values")]
async fn api_last_values(state: Data<AppState>) -> Result<impl Responder, Error> {
    let latest = latest::latest_per_sensor(&state.store).await?;
    let res = latest
        .into_iter()
        .map(|(sensor_id, r)| {
            (
                sensor_id,
                LatestValue {
                    timestamp: r.received_at().to_rfc3339(),
                    humidity: r.humidity,
                    temperature: r.temperature,
                    pressure: r.pressure,
                    gas: r.gas,
                    color: r.color,
                    alpha: r.alpha,
                },
            )
        })
        .collect::<BTreeMap<_, _>>();
    Ok(web::Json(res))
}

#[get("/time")]
async fn api_time(state: Data<AppState>) -> impl Responder {
    web::Json(state.store.clock().now().timestamp())
}

#[get("/api/series")]
async fn api_series_overview(
    query: web::Query<WindowQuery>,
    state: Data<AppState>,
) -> Result<impl Responder, Error> {
    let res = aggregate::overview(
        &state.store,
        &MeasurementField::ALL,
        &state.aggregation.bucket_widths,
        state.window(&query)?,
    )
    .await?;
    Ok(web::Json(res))
}

#[get("/api/series/{field}/{width}")]
async fn api_series(
    path: web::Path<(String, String)>,
    query: web::Query<WindowQuery>,
    state: Data<AppState>,
) -> Result<impl Responder, Error> {
    let (field, width) = path.into_inner();
    let field = aggregate::parse_field(&field)?;
    let width = aggregate::parse_width(&width)?;
    let window = state.window(&query)?;
    let now = state.store.clock().now();

    let series = aggregate::aggregate_at(&state.store, field, width, window, now).await?;
    Ok(web::Json(SeriesResponse {
        field,
        width,
        window_minutes: window.as_secs() / 60,
        series,
    }))
}

#[get("/api/readings/count")]
async fn api_reading_count(state: Data<AppState>) -> Result<impl Responder, Error> {
    let count = state.store.count().await.map_err(Error::StorageRead)?;
    Ok(web::Json(count))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(api_ingest)
        .service(api_last_values)
        .service(api_time)
        .service(api_series_overview)
        .service(api_series)
        .service(api_reading_count);
}

fn cors(origin: Option<&str>) -> Cors {
    let cors = match origin {
        Some(origin) => Cors::default().allowed_origin(origin),
        None => Cors::default().allow_any_origin(),
    };
    cors.allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT])
        .allowed_header(header::CONTENT_TYPE)
        .max_age(3600)
}

pub async fn new_http_server(state: AppState, config: &Config) -> std::io::Result<()> {
    let cors_origin = config.cors_origin.clone();
    info!("HTTP API listening on {}", config.http_bind);

    HttpServer::new(move || {
        App::new()
            .app_data(Data::new(state.clone()))
            .configure(configure)
            .wrap(cors(cors_origin.as_deref()))
    })
    .bind(config.http_bind.as_str())?
    .run()
    .await
}
