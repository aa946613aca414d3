// Sower
// Copyright (c) 2025 Sower Contributors
// Licensed and distributed under either of
//   * MIT license (license terms in the root directory or at http://opensource.org/licenses/MIT).
//   * Apache v2 license (license terms in the root directory or at http://www.apache.org/licenses/LICENSE-2.0).
// at your option. This file may not be copied, modified, or distributed except according to those terms.

#[cfg(test)]
mod tests {
    use sower_lib::{
        consts::{PROVIDE_TASK_GROUP_NUM, TID_BYTES_LEN},
        task::{FileInfo, ProvideSubTask, ProvideTask, Task},
        utils,
    };
    use sower_taskdb::{InMemoryTaskStore, TaskStore, TaskStoreError};

    fn create_task(fid: &str) -> ProvideTask {
        let task = Task {
            tid: utils::random_hex_id(TID_BYTES_LEN),
            exp: 3_600_000_000_000,
            acc: "0x0101010101010101010101010101010101010101".to_string(),
            addr: "http://gateway.test:1306".to_string(),
            did: fid.to_string(),
            timestamp: utils::now_string(),
        };
        let fragments = (0..2)
            .map(|i| {
                (0..PROVIDE_TASK_GROUP_NUM)
                    .map(|g| format!("frag-{i}-{g}"))
                    .collect()
            })
            .collect();
        let file = FileInfo {
            fid: fid.to_string(),
            file_name: format!("{fid}.bin"),
            territory: "default".to_string(),
            owner: "owner-acct".to_string(),
            file_size: 4096,
            segments: vec!["seg-0".to_string(), "seg-1".to_string()],
            fragments,
            base_dir: "/tmp/sower".to_string(),
        };
        ProvideTask::new(task, file)
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let store = InMemoryTaskStore::new();

        let mut ftask = create_task("fid-roundtrip");
        let gid = ftask.add_sub_task();
        ftask.sub_tasks.insert(
            utils::random_hex_id(TID_BYTES_LEN),
            ProvideSubTask {
                claimant: "0x0202020202020202020202020202020202020202".to_string(),
                group_id: gid,
                index: 2,
                timestamp: utils::now_string(),
                done: utils::now_string(),
            },
        );

        store.put("fid-roundtrip", &ftask).await.unwrap();
        let loaded = store.get("fid-roundtrip").await.unwrap();
        assert_eq!(loaded, ftask);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = InMemoryTaskStore::new();
        assert_eq!(
            store.get("fid-missing").await,
            Err(TaskStoreError::KeyNotFound("fid-missing".to_string()))
        );
    }

    #[tokio::test]
    async fn test_overwrite_keeps_one_record_per_fid() {
        let store = InMemoryTaskStore::new();

        let mut ftask = create_task("fid-one");
        store.put("fid-one", &ftask).await.unwrap();
        ftask.retry = 7;
        store.put("fid-one", &ftask).await.unwrap();

        assert_eq!(store.fids().await.unwrap(), vec!["fid-one".to_string()]);
        assert_eq!(store.get("fid-one").await.unwrap().retry, 7);
    }

    #[tokio::test]
    async fn test_delete_and_iterate() {
        let store = InMemoryTaskStore::new();

        for i in 0..3 {
            let fid = format!("fid-{i}");
            store.put(&fid, &create_task(&fid)).await.unwrap();
        }
        let mut fids = store.fids().await.unwrap();
        fids.sort();
        assert_eq!(fids, vec!["fid-0", "fid-1", "fid-2"]);

        store.delete("fid-1").await.unwrap();
        // deleting twice is fine
        store.delete("fid-1").await.unwrap();

        let mut fids = store.fids().await.unwrap();
        fids.sort();
        assert_eq!(fids, vec!["fid-0", "fid-2"]);
    }

    #[cfg(feature = "redis-db")]
    mod redis {
        use super::*;
        use sower_taskdb::{RedisStoreConfig, RedisTaskStore};

        #[ignore]
        #[tokio::test]
        async fn test_redis_store_round_trip() {
            let store = RedisTaskStore::open(RedisStoreConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
                ttl: 3600,
            })
            .unwrap();

            let ftask = create_task("fid-redis-roundtrip");
            store.put("fid-redis-roundtrip", &ftask).await.unwrap();
            assert_eq!(store.get("fid-redis-roundtrip").await.unwrap(), ftask);
            assert!(store
                .fids()
                .await
                .unwrap()
                .contains(&"fid-redis-roundtrip".to_string()));
            store.delete("fid-redis-roundtrip").await.unwrap();
        }
    }
}
