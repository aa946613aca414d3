use crate::{consts::PROVIDE_TASK_GROUP_NUM, impl_display_using_json};
use redis::{ErrorKind, FromRedisValue, RedisError, RedisResult, RedisWrite, ToRedisArgs, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Description of an erasure-coded file as handed over by the upload
/// pipeline: `fragments` is an `S x G` matrix with one row per segment and
/// one column per worker slice, and the fragment files live under `base_dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub fid: String,
    pub file_name: String,
    pub territory: String,
    pub owner: String,
    pub file_size: u64,
    pub segments: Vec<String>,
    pub fragments: Vec<Vec<String>>,
    pub base_dir: String,
}

/// The compact announcement broadcast on the provide channel. Workers resolve
/// `addr` and claim slices out-of-band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub tid: String,
    /// Task lifetime in nanoseconds.
    pub exp: i64,
    /// On-chain address of the announcing node.
    pub acc: String,
    /// Endpoint URL of the announcing node.
    pub addr: String,
    pub did: String,
    pub timestamp: String,
}

/// One claimed slice of the fragment matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvideSubTask {
    /// On-chain address derived from the claimant's public key.
    pub claimant: String,
    /// Column of the fragment matrix, in `[0, PROVIDE_TASK_GROUP_NUM)`.
    pub group_id: i32,
    /// Next row to serve; `group_size` means the slice is server-complete.
    pub index: usize,
    /// Last touch, canonical layout.
    pub timestamp: String,
    /// Empty until the chain confirms the slice.
    pub done: String,
}

/// The persisted provide-task record, keyed by fid in the task store. All
/// mutation happens under the per-fid key lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvideTask {
    #[serde(flatten)]
    pub task: Task,
    #[serde(flatten)]
    pub file: FileInfo,
    /// Rows of the fragment matrix (= number of segments).
    pub group_size: usize,
    /// token -> claimed slice.
    pub sub_tasks: HashMap<String, ProvideSubTask>,
    /// Group ids handed out so far; persisted so a restart cannot hand the
    /// same column out twice.
    pub reserved: BTreeSet<i32>,
    pub work_done: bool,
    pub retry: u32,
}

impl ProvideTask {
    pub fn new(task: Task, file: FileInfo) -> Self {
        let group_size = file.fragments.len();
        Self {
            task,
            file,
            group_size,
            sub_tasks: HashMap::new(),
            reserved: BTreeSet::new(),
            work_done: false,
            retry: 0,
        }
    }

    /// Reserve the lowest free group id, or `-1` when every column is taken.
    pub fn add_sub_task(&mut self) -> i32 {
        for gid in 0..PROVIDE_TASK_GROUP_NUM as i32 {
            if self.reserved.insert(gid) {
                return gid;
            }
        }
        -1
    }

    /// Return a group id to the free set.
    pub fn del_sub_task(&mut self, group_id: i32) {
        self.reserved.remove(&group_id);
    }
}

impl_display_using_json!(Task);
impl_display_using_json!(ProvideTask);

impl ToRedisArgs for Task {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        let serialized = serde_json::to_string(self).expect("Failed to serialize Task");
        out.write_arg(serialized.as_bytes());
    }
}

impl FromRedisValue for Task {
    fn from_redis_value(v: &Value) -> RedisResult<Self> {
        let serialized = String::from_redis_value(v)?;
        serde_json::from_str(&serialized)
            .map_err(|_| RedisError::from((ErrorKind::TypeError, "Task type conversion fail")))
    }
}

impl ToRedisArgs for ProvideTask {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        let serialized = serde_json::to_string(self).expect("Failed to serialize ProvideTask");
        out.write_arg(serialized.as_bytes());
    }
}

impl FromRedisValue for ProvideTask {
    fn from_redis_value(v: &Value) -> RedisResult<Self> {
        let serialized = String::from_redis_value(v)?;
        serde_json::from_str(&serialized).map_err(|_| {
            RedisError::from((ErrorKind::TypeError, "ProvideTask type conversion fail"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{consts::TID_BYTES_LEN, utils};

    fn sample_file(fid: &str) -> FileInfo {
        let fragments = (0..2)
            .map(|i| {
                (0..PROVIDE_TASK_GROUP_NUM)
                    .map(|g| format!("frag-{i}-{g}"))
                    .collect()
            })
            .collect();
        FileInfo {
            fid: fid.to_string(),
            file_name: format!("{fid}.bin"),
            territory: "default".to_string(),
            owner: "owner-acct".to_string(),
            file_size: 4096,
            segments: vec!["seg-0".to_string(), "seg-1".to_string()],
            fragments,
            base_dir: "/tmp/sower".to_string(),
        }
    }

    fn sample_task(fid: &str) -> ProvideTask {
        let task = Task {
            tid: utils::random_hex_id(TID_BYTES_LEN),
            exp: 3_600_000_000_000,
            acc: "0x0101010101010101010101010101010101010101".to_string(),
            addr: "http://gateway.test:1306".to_string(),
            did: fid.to_string(),
            timestamp: utils::now_string(),
        };
        ProvideTask::new(task, sample_file(fid))
    }

    #[test]
    fn add_sub_task_hands_out_lowest_free_group() {
        let mut ftask = sample_task("fid-groups");

        let mut seen = Vec::new();
        for _ in 0..PROVIDE_TASK_GROUP_NUM {
            seen.push(ftask.add_sub_task());
        }
        assert_eq!(seen, (0..PROVIDE_TASK_GROUP_NUM as i32).collect::<Vec<_>>());
        assert_eq!(ftask.add_sub_task(), -1);

        ftask.del_sub_task(5);
        assert_eq!(ftask.add_sub_task(), 5);
        assert_eq!(ftask.add_sub_task(), -1);
    }

    #[test]
    fn provide_task_round_trips_through_json() {
        let mut ftask = sample_task("fid-roundtrip");
        let gid = ftask.add_sub_task();
        ftask.sub_tasks.insert(
            "deadbeefdeadbeefdeadbeefdeadbeef".to_string(),
            ProvideSubTask {
                claimant: "0x0202020202020202020202020202020202020202".to_string(),
                group_id: gid,
                index: 1,
                timestamp: utils::now_string(),
                done: String::new(),
            },
        );
        ftask.retry = 3;

        let serialized = serde_json::to_string(&ftask).unwrap();
        let decoded: ProvideTask = serde_json::from_str(&serialized).unwrap();
        assert_eq!(decoded, ftask);
    }

    #[test]
    fn provide_task_round_trips_through_redis_value() {
        let ftask = sample_task("fid-redis");

        let args = ftask.to_redis_args();
        assert_eq!(args.len(), 1);
        let decoded = ProvideTask::from_redis_value(&Value::BulkString(args[0].clone())).unwrap();
        assert_eq!(decoded, ftask);
    }

    #[test]
    fn announcement_embeds_into_the_record_flat() {
        let ftask = sample_task("fid-flat");
        let value: serde_json::Value = serde_json::to_value(&ftask).unwrap();
        // embedded announcement and file info share one object
        assert_eq!(value["did"], "fid-flat");
        assert_eq!(value["fid"], "fid-flat");
        assert!(value.get("task").is_none());
        assert!(value.get("file").is_none());
    }
}
