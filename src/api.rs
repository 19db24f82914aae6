//! HTTP client for the game-state API.
//!
//! Every route answers with the uniform envelope `{success, error?, ...}`.
//! Any non-2xx status, unparseable body or `success: false` surfaces as an
//! [`ApiError`] and never mutates local state.

use crate::host::HostContext;
use crate::model::{Catalog, CropInfo, GameSnapshot, GridPos};
use crate::progression::{LevelRow, LevelTable};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned HTTP {0}")]
    Http(reqwest::StatusCode),
    /// A well-formed rejection from the backend, surfaced verbatim.
    #[error("{0}")]
    Domain(String),
    #[error("bad response body: {0}")]
    Decode(#[from] serde_json::Error),
}

pub struct ApiClient {
    base: String,
    player_id: u64,
    http: reqwest::Client,
    bearer: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlantOutcome {
    pub id: Option<String>,
    pub xp: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WaterOutcome {
    pub xp: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HarvestOutcome {
    pub plant_type: String,
    pub yield_count: u32,
    pub xp: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuyOutcome {
    pub total_price: u64,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SellOutcome {
    pub total_price: u64,
    pub xp: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlantReq<'a> {
    player_id: u64,
    seed_type: &'a str,
    position: GridPos,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WaterReq {
    player_id: u64,
    position: GridPos,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HarvestReq<'a> {
    player_id: u64,
    plant_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BuyReq<'a> {
    player_id: u64,
    seed_type: &'a str,
    quantity: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SellReq<'a> {
    player_id: u64,
    plant_type: &'a str,
    quantity: u32,
}

#[derive(Deserialize)]
struct CatalogBody {
    #[serde(default)]
    plants: Vec<CropInfo>,
}

#[derive(Deserialize)]
struct LevelTableBody {
    #[serde(default)]
    levels: Vec<LevelRow>,
}

impl ApiClient {
    pub fn new(base: &str, player_id: u64, host: &HostContext) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            player_id,
            http,
            bearer: host.session_token.clone(),
        })
    }

    pub fn player_id(&self) -> u64 {
        self.player_id
    }

    pub async fn game_state(&self) -> Result<GameSnapshot, ApiError> {
        self.get(&format!("/game/{}", self.player_id)).await
    }

    pub async fn plants_info(&self) -> Result<Catalog, ApiError> {
        let body: CatalogBody = self.get("/plants/info").await?;
        Ok(Catalog::from_crops(body.plants))
    }

    pub async fn level_table(&self) -> Result<LevelTable, ApiError> {
        let body: LevelTableBody = self.get("/levels/table").await?;
        Ok(LevelTable::from_rows(body.levels))
    }

    pub async fn plant(&self, seed_type: &str, position: GridPos) -> Result<PlantOutcome, ApiError> {
        self.post(
            "/farm/plant",
            &PlantReq {
                player_id: self.player_id,
                seed_type,
                position,
            },
        )
        .await
    }

    pub async fn water(&self, position: GridPos) -> Result<WaterOutcome, ApiError> {
        self.post(
            "/farm/water",
            &WaterReq {
                player_id: self.player_id,
                position,
            },
        )
        .await
    }

    pub async fn harvest(&self, plant_id: &str) -> Result<HarvestOutcome, ApiError> {
        self.post(
            "/farm/harvest",
            &HarvestReq {
                player_id: self.player_id,
                plant_id,
            },
        )
        .await
    }

    pub async fn buy(&self, seed_type: &str, quantity: u32) -> Result<BuyOutcome, ApiError> {
        self.post(
            "/shop/buy",
            &BuyReq {
                player_id: self.player_id,
                seed_type,
                quantity,
            },
        )
        .await
    }

    pub async fn sell(&self, plant_type: &str, quantity: u32) -> Result<SellOutcome, ApiError> {
        self.post(
            "/shop/sell",
            &SellReq {
                player_id: self.player_id,
                plant_type,
                quantity,
            },
        )
        .await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        debug!(path, "GET");
        let mut req = self.http.get(format!("{}{}", self.base, path));
        if let Some(token) = &self.bearer {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        unwrap_envelope(resp).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!(path, "POST");
        let mut req = self.http.post(format!("{}{}", self.base, path)).json(body);
        if let Some(token) = &self.bearer {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        unwrap_envelope(resp).await
    }
}

async fn unwrap_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        // Prefer a parseable error body over the bare status.
        if let Ok(body) = resp.json::<Value>().await {
            if let Some(msg) = body.get("error").and_then(Value::as_str) {
                return Err(ApiError::Domain(msg.to_string()));
            }
        }
        return Err(ApiError::Http(status));
    }
    let body: Value = resp.json().await?;
    decode_envelope(body)
}

fn decode_envelope<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    let success = body
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !success {
        let msg = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("request rejected")
            .to_string();
        return Err(ApiError::Domain(msg));
    }
    Ok(serde_json::from_value(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_success_decodes_payload() {
        let out: HarvestOutcome = decode_envelope(json!({
            "success": true,
            "plantType": "carrot",
            "yieldCount": 3,
            "xp": 10
        }))
        .unwrap();
        assert_eq!(out.plant_type, "carrot");
        assert_eq!(out.yield_count, 3);
        assert_eq!(out.xp, Some(10));
    }

    #[test]
    fn envelope_failure_yields_domain_error() {
        let err = decode_envelope::<HarvestOutcome>(json!({
            "success": false,
            "error": "plant is not ready"
        }))
        .unwrap_err();
        assert!(matches!(err, ApiError::Domain(msg) if msg == "plant is not ready"));
    }

    #[test]
    fn envelope_without_success_flag_is_rejected() {
        let err = decode_envelope::<WaterOutcome>(json!({ "xp": 2 })).unwrap_err();
        assert!(matches!(err, ApiError::Domain(_)));
    }

    #[test]
    fn snapshot_decodes_from_state_route_body() {
        let snap: GameSnapshot = decode_envelope(json!({
            "success": true,
            "player": { "id": 1, "coins": 1000, "diamonds": 5 },
            "farm": [{
                "id": "a1",
                "kind": "carrot",
                "stage": 2,
                "plantedAt": "2026-08-01T10:00:00Z",
                "lastWateredAt": "2026-08-01T12:00:00Z",
                "watered": true,
                "withered": false,
                "position": { "x": 2, "y": 3 }
            }],
            "inventory": { "seeds": { "carrot": 4 }, "harvest": {} },
            "level": {
                "currentLevel": 2,
                "currentXp": 40,
                "xpToNextLevel": 200,
                "unlockedPlants": ["carrot", "tomato"]
            }
        }))
        .unwrap();
        assert_eq!(snap.player.coins, 1000);
        assert_eq!(snap.farm.len(), 1);
        assert_eq!(snap.grid.width, 5);
        assert_eq!(snap.level.current_level, 2);
    }
}
