use async_trait::async_trait;
use cabs_core::{BookOutcome, CabRepository, StoreError, StoreResult, Subscription};
use cabs_shared::{Cab, CabId, CabStatus, NewCab};
use futures_util::{future, stream, Stream, StreamExt};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::{debug, info};

// KEYS[1] cab hash, KEYS[2] booked set. ARGV: id, "true"/"false", owner, channel
const SET_STATUS_SCRIPT: &str = r#"
    if redis.call("EXISTS", KEYS[1]) == 0 then
        return -1
    end
    local owner = ARGV[3]
    if ARGV[2] == "false" then
        owner = ""
    end
    if redis.call("HGET", KEYS[1], "status") == ARGV[2] and redis.call("HGET", KEYS[1], "bookedBy") == owner then
        return 0
    end
    redis.call("HSET", KEYS[1], "status", ARGV[2], "bookedBy", owner)
    if ARGV[2] == "true" then
        redis.call("SADD", KEYS[2], ARGV[1])
    else
        redis.call("SREM", KEYS[2], ARGV[1])
    end
    redis.call("PUBLISH", ARGV[4], ARGV[1])
    return 1
"#;

// KEYS[1] cab hash, KEYS[2] booked set. ARGV: id, limit, owner, channel
const BOOK_SCRIPT: &str = r#"
    if redis.call("EXISTS", KEYS[1]) == 0 then
        return -1
    end
    if redis.call("HGET", KEYS[1], "status") == "true" then
        return 2
    end
    if redis.call("SCARD", KEYS[2]) >= tonumber(ARGV[2]) then
        return 0
    end
    redis.call("HSET", KEYS[1], "status", "true", "bookedBy", ARGV[3])
    redis.call("SADD", KEYS[2], ARGV[1])
    redis.call("PUBLISH", ARGV[4], ARGV[1])
    return 1
"#;

#[derive(Debug, Clone)]
struct KeySpace {
    namespace: String,
}

impl KeySpace {
    fn cab(&self, id: &str) -> String {
        format!("{}:cab:{}", self.namespace, id)
    }

    fn index(&self) -> String {
        format!("{}:cabs", self.namespace)
    }

    fn booked(&self) -> String {
        format!("{}:cabs:booked", self.namespace)
    }

    fn channel(&self) -> String {
        format!("{}:changes", self.namespace)
    }
}

/// Cab collection stored in Redis.
///
/// Each cab is a hash; ids are listed in insertion order and booked ids are
/// mirrored in a set so the booking cap is one `SCARD`. Every write publishes
/// the changed id, which live subscriptions use to re-read the document.
#[derive(Clone)]
pub struct RedisCabStore {
    client: redis::Client,
    keys: KeySpace,
}

impl RedisCabStore {
    pub fn new(connection_string: &str, namespace: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self {
            client,
            keys: KeySpace {
                namespace: namespace.to_string(),
            },
        })
    }

    async fn conn(&self) -> StoreResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)
    }

    async fn read_cab(&self, conn: &mut MultiplexedConnection, id: &CabId) -> StoreResult<Option<Cab>> {
        let fields: HashMap<String, String> =
            conn.hgetall(self.keys.cab(id.as_str())).await.map_err(backend)?;
        if fields.is_empty() {
            return Ok(None);
        }
        decode_cab(id, &fields).map(Some)
    }

    async fn read_many(&self, conn: &mut MultiplexedConnection, ids: Vec<String>) -> StoreResult<Vec<Cab>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.hgetall(self.keys.cab(id));
        }
        let rows: Vec<HashMap<String, String>> = pipe.query_async(conn).await.map_err(backend)?;

        ids.into_iter()
            .zip(rows)
            .filter(|(_, fields)| !fields.is_empty())
            .map(|(id, fields)| decode_cab(&CabId::from(id), &fields))
            .collect()
    }

    /// Dedicated pub/sub connection yielding the ids of changed documents.
    /// Dropping the stream closes the connection. If the server drops it
    /// instead, the feed ends with `SubscriptionClosed`.
    async fn change_feed(&self) -> StoreResult<impl Stream<Item = StoreResult<String>> + Send + 'static> {
        let channel = self.keys.channel();
        let mut pubsub = self.client.get_async_pubsub().await.map_err(backend)?;
        pubsub.subscribe(&channel).await.map_err(backend)?;
        debug!("Subscribed to {}", channel);

        let closed = stream::once(future::ready(Err(StoreError::SubscriptionClosed(channel))));
        Ok(pubsub
            .into_on_message()
            .filter_map(|msg| future::ready(msg.get_payload::<String>().ok()))
            .map(Ok)
            .chain(closed))
    }
}

#[async_trait]
impl CabRepository for RedisCabStore {
    async fn list_cabs(&self) -> StoreResult<Vec<Cab>> {
        let mut conn = self.conn().await?;
        let ids: Vec<String> = conn.lrange(self.keys.index(), 0, -1).await.map_err(backend)?;
        self.read_many(&mut conn, ids).await
    }

    async fn get_cab(&self, id: &CabId) -> StoreResult<Option<Cab>> {
        let mut conn = self.conn().await?;
        self.read_cab(&mut conn, id).await
    }

    async fn list_by_status(&self, status: CabStatus) -> StoreResult<Vec<Cab>> {
        match status {
            CabStatus::Booked => {
                let mut conn = self.conn().await?;
                let ids: Vec<String> = conn.smembers(self.keys.booked()).await.map_err(backend)?;
                let cabs = self.read_many(&mut conn, ids).await?;
                Ok(cabs.into_iter().filter(|c| c.status == status).collect())
            }
            CabStatus::Available => {
                let cabs = self.list_cabs().await?;
                Ok(cabs.into_iter().filter(|c| c.status == status).collect())
            }
        }
    }

    async fn set_status(
        &self,
        id: &CabId,
        status: CabStatus,
        booked_by: Option<&str>,
    ) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let script = redis::Script::new(SET_STATUS_SCRIPT);
        let result: i64 = script
            .key(self.keys.cab(id.as_str()))
            .key(self.keys.booked())
            .arg(id.as_str())
            .arg(status_field(status))
            .arg(booked_by.unwrap_or(""))
            .arg(self.keys.channel())
            .invoke_async(&mut conn)
            .await
            .map_err(backend)?;

        match result {
            -1 => Err(StoreError::NotFound(id.clone())),
            changed => Ok(changed == 1),
        }
    }

    async fn book_within_limit(
        &self,
        id: &CabId,
        limit: usize,
        requester: Option<&str>,
    ) -> StoreResult<BookOutcome> {
        let mut conn = self.conn().await?;
        let script = redis::Script::new(BOOK_SCRIPT);
        let result: i64 = script
            .key(self.keys.cab(id.as_str()))
            .key(self.keys.booked())
            .arg(id.as_str())
            .arg(limit)
            .arg(requester.unwrap_or(""))
            .arg(self.keys.channel())
            .invoke_async(&mut conn)
            .await
            .map_err(backend)?;

        match result {
            -1 => Err(StoreError::NotFound(id.clone())),
            0 => Ok(BookOutcome::LimitReached { limit }),
            2 => Ok(BookOutcome::AlreadyBooked),
            _ => {
                info!("Cab {} booked", id);
                Ok(BookOutcome::Booked)
            }
        }
    }

    async fn watch_cab(&self, id: &CabId) -> StoreResult<Subscription<Option<Cab>>> {
        let feed = self.change_feed().await?;
        let mut conn = self.conn().await?;
        let current = self.read_cab(&mut conn, id).await?;

        let store = self.clone();
        let target = id.clone();
        let updates = feed
            .filter(move |changed| {
                let relevant = match changed {
                    Ok(changed) => changed.as_str() == target.as_str(),
                    Err(_) => true,
                };
                future::ready(relevant)
            })
            .then(move |changed| {
                let store = store.clone();
                let mut conn = conn.clone();
                async move {
                    match changed {
                        Ok(changed) => store.read_cab(&mut conn, &CabId::from(changed)).await,
                        Err(e) => Err(e),
                    }
                }
            });

        Ok(Subscription::new(stream::once(future::ready(Ok(current))).chain(updates)))
    }

    async fn watch_cabs(&self) -> StoreResult<Subscription<Vec<Cab>>> {
        let feed = self.change_feed().await?;
        let current = self.list_cabs().await?;

        let store = self.clone();
        let updates = feed.then(move |changed| {
            let store = store.clone();
            async move {
                match changed {
                    Ok(_) => store.list_cabs().await,
                    Err(e) => Err(e),
                }
            }
        });

        Ok(Subscription::new(stream::once(future::ready(Ok(current))).chain(updates)))
    }

    async fn insert_cab(&self, cab: NewCab) -> StoreResult<CabId> {
        let id = CabId::generate();
        let booked = cab.status.is_booked();
        let fields = encode_cab(&cab);

        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_multiple(self.keys.cab(id.as_str()), fields.as_slice())
            .ignore()
            .rpush(self.keys.index(), id.as_str())
            .ignore();
        if booked {
            pipe.sadd(self.keys.booked(), id.as_str()).ignore();
        }
        pipe.publish(self.keys.channel(), id.as_str()).ignore();

        let mut conn = self.conn().await?;
        let _: () = pipe.query_async(&mut conn).await.map_err(backend)?;
        Ok(id)
    }
}

fn backend(err: redis::RedisError) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn status_field(status: CabStatus) -> &'static str {
    if status.is_booked() {
        "true"
    } else {
        "false"
    }
}

fn encode_cab(cab: &NewCab) -> Vec<(&'static str, String)> {
    vec![
        ("companyName", cab.company_name.clone()),
        ("carModel", cab.car_model.clone()),
        ("passengerCapacity", cab.passenger_capacity.to_string()),
        ("rating", cab.rating.to_string()),
        ("costPerHour", cab.cost_per_hour.to_string()),
        ("status", status_field(cab.status).to_string()),
        ("bookedBy", cab.booked_by.clone().unwrap_or_default()),
    ]
}

fn decode_cab(id: &CabId, fields: &HashMap<String, String>) -> StoreResult<Cab> {
    let malformed = |reason: String| StoreError::Malformed {
        id: id.to_string(),
        reason,
    };
    let text = |name: &str| {
        fields
            .get(name)
            .cloned()
            .ok_or_else(|| malformed(format!("missing field {}", name)))
    };

    let passenger_capacity = text("passengerCapacity")?
        .parse::<u32>()
        .map_err(|e| malformed(format!("passengerCapacity: {}", e)))?;
    let rating = text("rating")?
        .parse::<f64>()
        .map_err(|e| malformed(format!("rating: {}", e)))?;
    let cost_per_hour = text("costPerHour")?
        .parse::<f64>()
        .map_err(|e| malformed(format!("costPerHour: {}", e)))?;
    let status = match fields.get("status").map(String::as_str) {
        Some("true") => CabStatus::Booked,
        Some("false") | None => CabStatus::Available,
        Some(other) => return Err(malformed(format!("status: {}", other))),
    };
    let booked_by = fields
        .get("bookedBy")
        .filter(|owner| !owner.is_empty() && status.is_booked())
        .cloned();

    Ok(Cab {
        id: id.clone(),
        company_name: text("companyName")?,
        car_model: text("carModel")?,
        passenger_capacity,
        rating,
        cost_per_hour,
        status,
        booked_by,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(cab: &NewCab) -> HashMap<String, String> {
        encode_cab(cab)
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_key_layout() {
        let keys = KeySpace { namespace: "cabs".to_string() };
        assert_eq!(keys.cab("42"), "cabs:cab:42");
        assert_eq!(keys.index(), "cabs:cabs");
        assert_eq!(keys.booked(), "cabs:cabs:booked");
        assert_eq!(keys.channel(), "cabs:changes");
    }

    #[test]
    fn test_hash_fields_decode_to_cab() {
        let mut new = NewCab::new("Yellow Co", "Camry").with_capacity(5).with_rating(4.5).with_cost(45.25);
        new.status = CabStatus::Booked;
        new.booked_by = Some("guest-7".into());

        let cab = decode_cab(&CabId::new("c1"), &fields(&new)).unwrap();
        assert_eq!(cab, Cab::from_new(CabId::new("c1"), new));
    }

    #[test]
    fn test_available_cab_has_no_owner() {
        let new = NewCab::new("Metro", "Prius");
        let mut raw = fields(&new);
        raw.insert("bookedBy".into(), "stale".into());

        let cab = decode_cab(&CabId::new("c2"), &raw).unwrap();
        assert_eq!(cab.status, CabStatus::Available);
        assert!(cab.booked_by.is_none());
    }

    #[test]
    fn test_malformed_hash() {
        let mut raw = fields(&NewCab::new("Metro", "Prius"));
        raw.insert("passengerCapacity".into(), "many".into());
        assert!(matches!(
            decode_cab(&CabId::new("c3"), &raw),
            Err(StoreError::Malformed { .. })
        ));

        raw.remove("passengerCapacity");
        assert!(matches!(
            decode_cab(&CabId::new("c3"), &raw),
            Err(StoreError::Malformed { .. })
        ));
    }

    // Server-backed tests: `cargo test -- --ignored` with REDIS_URL pointing at
    // a disposable instance. Each test works in its own namespace.
    fn live_store() -> RedisCabStore {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        RedisCabStore::new(&url, &format!("cabs-test-{}", CabId::generate())).unwrap()
    }

    #[tokio::test]
    #[ignore = "needs a redis server at REDIS_URL"]
    async fn test_book_script_outcomes() {
        let store = live_store();
        let a = store.insert_cab(NewCab::new("A", "Sedan")).await.unwrap();
        let b = store.insert_cab(NewCab::new("B", "Van")).await.unwrap();
        let c = store.insert_cab(NewCab::new("C", "Coupe")).await.unwrap();

        assert_eq!(store.book_within_limit(&a, 2, Some("guest-1")).await.unwrap(), BookOutcome::Booked);
        assert_eq!(store.book_within_limit(&a, 2, Some("guest-2")).await.unwrap(), BookOutcome::AlreadyBooked);
        assert_eq!(store.book_within_limit(&b, 2, None).await.unwrap(), BookOutcome::Booked);
        assert_eq!(
            store.book_within_limit(&c, 2, Some("guest-3")).await.unwrap(),
            BookOutcome::LimitReached { limit: 2 }
        );

        let first = store.get_cab(&a).await.unwrap().unwrap();
        assert_eq!(first.booked_by.as_deref(), Some("guest-1"));
        assert_eq!(store.get_cab(&c).await.unwrap().unwrap().status, CabStatus::Available);
        assert_eq!(store.list_by_status(CabStatus::Booked).await.unwrap().len(), 2);

        let missing = store.book_within_limit(&CabId::new("ghost"), 2, None).await;
        assert_eq!(missing, Err(StoreError::NotFound(CabId::new("ghost"))));
    }

    #[tokio::test]
    #[ignore = "needs a redis server at REDIS_URL"]
    async fn test_set_status_script() {
        let store = live_store();
        let a = store.insert_cab(NewCab::new("A", "Sedan")).await.unwrap();
        store.book_within_limit(&a, 2, Some("guest-1")).await.unwrap();

        assert!(store.set_status(&a, CabStatus::Available, Some("guest-1")).await.unwrap());
        let cab = store.get_cab(&a).await.unwrap().unwrap();
        assert_eq!(cab.status, CabStatus::Available);
        assert_eq!(cab.booked_by, None);
        assert!(store.list_by_status(CabStatus::Booked).await.unwrap().is_empty());

        assert!(!store.set_status(&a, CabStatus::Available, None).await.unwrap());

        let missing = store.set_status(&CabId::new("ghost"), CabStatus::Booked, None).await;
        assert_eq!(missing, Err(StoreError::NotFound(CabId::new("ghost"))));
    }

    #[tokio::test]
    #[ignore = "needs a redis server at REDIS_URL"]
    async fn test_watch_cab_receives_published_change() {
        let store = live_store();
        let a = store.insert_cab(NewCab::new("A", "Sedan")).await.unwrap();
        let b = store.insert_cab(NewCab::new("B", "Van")).await.unwrap();

        let mut sub = store.watch_cab(&a).await.unwrap();
        let first = sub.next().await.unwrap().unwrap().unwrap();
        assert_eq!(first.status, CabStatus::Available);

        store.book_within_limit(&b, 2, None).await.unwrap();
        store.book_within_limit(&a, 2, Some("guest-1")).await.unwrap();

        let next = sub.next().await.unwrap().unwrap().unwrap();
        assert_eq!(next.id, a);
        assert_eq!(next.status, CabStatus::Booked);
    }
}
