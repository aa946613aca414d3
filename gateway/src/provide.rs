use crate::{
    buffer::FileBuffer,
    bus::ProvideBus,
    chain::{RpcStorageChain, SegmentDataInfo, StorageChain, StorageOrder},
    config::Config,
    error::{GatewayError, GatewayResult},
    keylock::KeyLock,
    stats::ProvideStats,
};
use alloy_primitives::Address;
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use sower_lib::{
    consts::{
        CHANNEL_PROVIDE, PROVIDE_TASK_CHECK_TIME, PROVIDE_TASK_GROUP_NUM, REQUEST_EXPIRY,
        TID_BYTES_LEN,
    },
    signature,
    task::{FileInfo, ProvideSubTask, ProvideTask, Task},
    utils,
};
use sower_taskdb::TaskStore;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A worker's signed request for one slice of a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRequest {
    /// Hex-encoded 33-byte compressed secp256k1 public key.
    pub pubkey: String,
    pub fid: String,
    /// Creation time in the canonical layout; requests expire after 15 s.
    pub timestamp: String,
    /// Hex-encoded compact signature over the request with `sign` cleared.
    pub sign: String,
}

impl FileRequest {
    /// The byte sequence the signature covers: the request serialized with
    /// `sign` cleared. Field order and escaping are a cross-node contract.
    pub fn canonical_bytes(&self) -> serde_json::Result<Vec<u8>> {
        let mut unsigned = self.clone();
        unsigned.sign = String::new();
        serde_json::to_vec(&unsigned)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileResponse {
    pub fid: String,
    /// The claimed column of the fragment matrix, in segment order.
    pub fragments: Vec<String>,
    /// Authorizes subsequent fetches of the slice.
    pub token: String,
}

/// File-provision coordinator. One instance per node; endpoints run
/// concurrently and the reconciler runs on its own timer, all serialized
/// per fid by the key-lock table.
pub struct Gateway {
    config: Config,
    node_address: Address,
    task_store: Arc<dyn TaskStore>,
    key_lock: KeyLock,
    pstats: ProvideStats,
    bus: Arc<dyn ProvideBus>,
    chain: Mutex<Option<Arc<dyn StorageChain>>>,
}

impl Gateway {
    pub fn new(
        config: Config,
        task_store: Arc<dyn TaskStore>,
        bus: Arc<dyn ProvideBus>,
    ) -> GatewayResult<Self> {
        let node_address = config.node_address()?;
        Ok(Self {
            config,
            node_address,
            task_store,
            key_lock: KeyLock::new(),
            pstats: ProvideStats::default(),
            bus,
            chain: Mutex::new(None),
        })
    }

    /// Pre-seed the chain-client slot; embedders that carry their own client
    /// (and tests) skip the endpoint probing this way.
    pub fn with_chain(self, chain: Arc<dyn StorageChain>) -> Self {
        Self {
            chain: Mutex::new(Some(chain)),
            ..self
        }
    }

    pub fn stats(&self) -> &ProvideStats {
        &self.pstats
    }

    /// The lazy chain-client slot. Every use probes the held client and
    /// reconstructs it from the configured endpoints when the probe fails;
    /// reconstruction is serialized by the slot's mutex.
    pub async fn storage_chain(&self) -> GatewayResult<Arc<dyn StorageChain>> {
        let mut slot = self.chain.lock().await;
        if let Some(chain) = slot.as_ref() {
            if chain.query_block_number().await.is_ok() {
                return Ok(chain.clone());
            }
        }
        let secret = self.config.node_secret()?;
        let chain: Arc<dyn StorageChain> =
            Arc::new(RpcStorageChain::connect(&self.config.rpcs, secret).await?);
        *slot = Some(chain.clone());
        Ok(chain)
    }

    /// Admit a file for distribution: reserve its fid, register the storage
    /// order on chain, persist the provide task and announce it to workers.
    pub async fn provide_file(&self, exp: Duration, info: FileInfo) -> GatewayResult<()> {
        let fid = info.fid.clone();
        if self.pstats.fids_load_or_store(&fid) {
            return Err(GatewayError::Conflict);
        }

        let task = Task {
            tid: utils::random_hex_id(TID_BYTES_LEN),
            exp: exp.as_nanos() as i64,
            acc: self.node_address.to_checksum(None),
            addr: self.config.endpoint.clone(),
            did: fid.clone(),
            timestamp: utils::now_string(),
        };
        let provide_task = ProvideTask::new(task.clone(), info);

        let hash = match self.create_storage_order(&provide_task.file).await {
            Ok(hash) => hash,
            Err(err) => {
                // the reservation only survives a registered order
                self.pstats.fids_delete(&fid);
                return Err(err);
            }
        };
        info!("created storage order for file {fid}, tx hash {hash}");

        self.task_store.put(&fid, &provide_task).await?;
        self.bus.publish(CHANNEL_PROVIDE, &task).await?;
        self.pstats.ongoing_inc();
        Ok(())
    }

    /// Assemble the per-segment chain payload and register the order.
    pub async fn create_storage_order(&self, info: &FileInfo) -> GatewayResult<String> {
        let segments = info
            .segments
            .iter()
            .zip(info.fragments.iter())
            .map(|(segment_hash, row)| SegmentDataInfo {
                segment_hash: segment_hash.clone(),
                fragment_hashes: row.clone(),
            })
            .collect();
        let order = StorageOrder {
            fid: info.fid.clone(),
            file_name: info.file_name.clone(),
            territory: info.territory.clone(),
            segments,
            owner: info.owner.clone(),
            file_size: info.file_size,
        };
        let chain = self.storage_chain().await?;
        Ok(chain.create_storage_order(order).await?)
    }

    /// Verify a worker's signed claim and allocate one free slice to it.
    pub async fn claim_file(&self, req: FileRequest) -> GatewayResult<FileResponse> {
        let sign = hex::decode(&req.sign)
            .map_err(|e| GatewayError::BadRequest(format!("malformed signature: {e}")))?;
        let date = utils::parse_timestamp(&req.timestamp)
            .map_err(|e| GatewayError::BadRequest(format!("malformed timestamp: {e}")))?;
        let age = chrono::Utc::now().naive_utc().signed_duration_since(date);
        if age > chrono::Duration::seconds(REQUEST_EXPIRY.as_secs() as i64) {
            return Err(GatewayError::Expired);
        }
        let pubkey_bytes = hex::decode(&req.pubkey)
            .map_err(|e| GatewayError::BadRequest(format!("malformed pubkey: {e}")))?;
        let pubkey = PublicKey::from_slice(&pubkey_bytes)
            .map_err(|e| GatewayError::BadRequest(format!("malformed pubkey: {e}")))?;
        let canonical = req
            .canonical_bytes()
            .map_err(|e| GatewayError::BadRequest(e.to_string()))?;
        if !signature::verify_message(&pubkey, &canonical, &sign) {
            return Err(GatewayError::AuthFailed);
        }

        if !self.pstats.fids_contains(&req.fid) {
            return Err(GatewayError::NotFound(format!(
                "file {} is not being provided",
                req.fid
            )));
        }

        let _guard = self.key_lock.lock(&req.fid).await;
        let mut ftask = match self.task_store.get(&req.fid).await {
            Ok(ftask) => ftask,
            Err(err) => {
                // task gone, remove its lock entry with it
                self.key_lock.remove(&req.fid);
                return Err(err.into());
            }
        };
        if ftask.sub_tasks.len() == PROVIDE_TASK_GROUP_NUM {
            return Err(GatewayError::AlreadyClaimed);
        }
        let gid = ftask.add_sub_task();
        if gid == -1 {
            return Err(GatewayError::AlreadyClaimed);
        }

        let claimant = signature::public_key_to_address(&pubkey).to_checksum(None);
        let token = loop {
            let token = utils::random_hex_id(TID_BYTES_LEN);
            if !ftask.sub_tasks.contains_key(&token) {
                break token;
            }
        };
        ftask.sub_tasks.insert(
            token.clone(),
            ProvideSubTask {
                claimant,
                group_id: gid,
                index: 0,
                timestamp: utils::now_string(),
                done: String::new(),
            },
        );

        let mut fragments = Vec::with_capacity(ftask.group_size);
        for i in 0..ftask.group_size {
            fragments.push(ftask.file.fragments[i][gid as usize].clone());
        }
        self.task_store.put(&req.fid, &ftask).await?;
        Ok(FileResponse {
            fid: req.fid,
            fragments,
            token,
        })
    }

    /// Resolve the next fragment path of a claimed slice and advance its
    /// cursor. The transport layer streams the file; transmission failures
    /// are not observed here.
    pub async fn fetch_file(&self, fid: &str, did: &str, token: &str) -> GatewayResult<PathBuf> {
        debug!("fetch file {fid} (did {did}) token {token}");
        // idempotent presence probe
        if !self.pstats.fids_load_or_store(fid) {
            return Err(GatewayError::NotFound(format!("wrong file id {fid}")));
        }

        let _guard = self.key_lock.lock(fid).await;
        let mut ftask = self.task_store.get(fid).await?;
        let Some(sub_task) = ftask.sub_tasks.get_mut(token) else {
            return Err(GatewayError::NotFound(format!("subtask {token} not found")));
        };
        if sub_task.index == ftask.group_size {
            return Err(GatewayError::Exhausted);
        }
        let fpath = PathBuf::from(&ftask.file.base_dir)
            .join(&ftask.file.fragments[sub_task.index][sub_task.group_id as usize]);
        sub_task.index += 1;
        self.task_store.put(fid, &ftask).await?;
        Ok(fpath)
    }

    /// Drive the reconciliation loop until `shutdown` is canceled.
    pub async fn provide_task_checker(
        &self,
        shutdown: CancellationToken,
        buffer: &FileBuffer,
    ) -> GatewayResult<()> {
        let start = tokio::time::Instant::now() + PROVIDE_TASK_CHECK_TIME;
        let mut ticker = tokio::time::interval_at(start, PROVIDE_TASK_CHECK_TIME);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.check_provide_tasks(buffer).await {
                        error!("check provide tasks error: {err}");
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("provide task checker done");
                    return Ok(());
                }
            }
        }
    }

    /// One reconciliation sweep over every persisted provide task.
    ///
    /// Store failures abort the sweep; chain and bus failures are handled per
    /// record so one bad task cannot stall the loop.
    pub async fn check_provide_tasks(&self, buffer: &FileBuffer) -> GatewayResult<()> {
        for fid in self.task_store.fids().await? {
            let _guard = self.key_lock.lock(&fid).await;
            let mut ftask = self.task_store.get(&fid).await?;
            if ftask.work_done {
                self.pstats.task_done(&fid);
                self.key_lock.remove(&fid);
                info!("file {fid} distribute workflow done");
                self.task_store.delete(&fid).await?;
                continue;
            }

            let chain = match self.storage_chain().await {
                Ok(chain) => chain,
                Err(err) => {
                    error!("get chain client error: {err}");
                    continue;
                }
            };
            let mut done = 0;
            match chain.query_deal_map(&fid).await {
                Ok(deal_map) => {
                    let now = chrono::Utc::now().naive_utc();
                    let stale_after =
                        chrono::Duration::seconds(PROVIDE_TASK_CHECK_TIME.as_secs() as i64 * 2);
                    let mut stale = Vec::new();
                    for (token, sub_task) in ftask.sub_tasks.iter_mut() {
                        // group ids are 1-based on chain
                        if sub_task.index == ftask.group_size
                            && deal_map.contains(&(sub_task.group_id + 1))
                        {
                            sub_task.done = utils::now_string();
                            done += 1;
                            if let Err(err) = remove_sub_task_files(
                                buffer,
                                sub_task.group_id,
                                &ftask.file.base_dir,
                                &ftask.file.fragments,
                            )
                            .await
                            {
                                error!(
                                    "remove fragments of file {fid} group {} error: {err}",
                                    sub_task.group_id
                                );
                            }
                            continue;
                        }
                        let Ok(updated) = utils::parse_timestamp(&sub_task.timestamp) else {
                            continue;
                        };
                        if now.signed_duration_since(updated) >= stale_after {
                            info!(
                                "remove subtask {} of file {fid}, timeout",
                                sub_task.group_id + 1
                            );
                            stale.push((token.clone(), sub_task.group_id));
                        }
                    }
                    for (token, group_id) in stale {
                        ftask.del_sub_task(group_id);
                        ftask.sub_tasks.remove(&token);
                    }
                }
                Err(err) if err.is_empty_deal_map() || err.to_string().contains("empty") => {
                    info!("file {fid} deal map empty: {err}");
                    done = PROVIDE_TASK_GROUP_NUM;
                }
                Err(err) => {
                    error!("query deal map for file {fid} error: {err}");
                    continue;
                }
            }

            if done == PROVIDE_TASK_GROUP_NUM {
                info!("file {fid} distributed");
                ftask.work_done = true;
            } else if ftask.sub_tasks.len() < PROVIDE_TASK_GROUP_NUM {
                match self.bus.publish(CHANNEL_PROVIDE, &ftask.task).await {
                    Ok(()) => {
                        ftask.retry += 1;
                        self.pstats.task_flash(&fid);
                    }
                    Err(err) => {
                        error!("republish task for file {fid} error: {err}");
                        continue;
                    }
                }
            }
            self.task_store.put(&fid, &ftask).await?;
            if done == PROVIDE_TASK_GROUP_NUM {
                // the fid leaves the active set; the record goes next sweep
                self.pstats.fids_delete(&fid);
            }
        }
        Ok(())
    }
}

/// Delete every fragment file of a settled slice.
pub async fn remove_sub_task_files(
    buffer: &FileBuffer,
    group_id: i32,
    base_dir: &str,
    fragments: &[Vec<String>],
) -> std::io::Result<()> {
    for row in fragments {
        buffer
            .remove(PathBuf::from(base_dir).join(&row[group_id as usize]))
            .await?;
    }
    Ok(())
}
