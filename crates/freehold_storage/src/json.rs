//! JSON-file storage backend.
//!
//! One document per record under a data directory:
//!
//! ```text
//! <root>/regions/<id>.json
//! <root>/groups/<id>.json
//! <root>/members/<id>.json
//! <root>/players/<id>.json
//! ```
//!
//! Writes go through a temp file, fsync, and an atomic rename so a crash
//! mid-write never leaves a truncated record behind. The whole directory is
//! loaded eagerly at open; corrupt files are logged and skipped.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::{fs as tokio_fs, io::AsyncWriteExt};
use tracing::{debug, info, warn};

use async_trait::async_trait;
use freehold_types::{
    Group, GroupId, Member, MemberId, PlayerId, PlayerRecord, PlayerRecordId, Region, RegionId,
    ShardId,
};

use crate::{
    GroupStore, MemberStore, MemoryStore, PlayerStore, RegionStore, StorageError, StorageResult,
};

const REGIONS_DIR: &str = "regions";
const GROUPS_DIR: &str = "groups";
const MEMBERS_DIR: &str = "members";
const PLAYERS_DIR: &str = "players";

/// Directory-of-JSON-documents store.
///
/// Reads are served from in-memory tables populated at open; every write
/// helper updates the tables and the backing file together.
#[derive(Debug)]
pub struct JsonStore {
    root: PathBuf,
    tables: MemoryStore,
}

impl JsonStore {
    /// Open (creating if necessary) the store rooted at `root` and load
    /// every record it holds.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        let tables = MemoryStore::new();

        for dir in [REGIONS_DIR, GROUPS_DIR, MEMBERS_DIR, PLAYERS_DIR] {
            let path = root.join(dir);
            tokio_fs::create_dir_all(&path)
                .await
                .map_err(|e| StorageError::DirectoryCreate(path.clone(), e))?;
        }

        let regions: Vec<Region> = load_dir(&root.join(REGIONS_DIR)).await?;
        let groups: Vec<Group> = load_dir(&root.join(GROUPS_DIR)).await?;
        let members: Vec<Member> = load_dir(&root.join(MEMBERS_DIR)).await?;
        let players: Vec<PlayerRecord> = load_dir(&root.join(PLAYERS_DIR)).await?;

        info!(
            "📂 Opened claim store at {}: {} regions, {} groups, {} members, {} players",
            root.display(),
            regions.len(),
            groups.len(),
            members.len(),
            players.len()
        );

        for region in regions {
            tables.put_region(region);
        }
        for group in groups {
            tables.put_group(group);
        }
        for member in members {
            tables.put_member(member);
        }
        for player in players {
            tables.put_player(player);
        }

        Ok(Self { root, tables })
    }

    fn region_path(&self, id: RegionId) -> PathBuf {
        self.root.join(REGIONS_DIR).join(format!("{}.json", id))
    }

    fn group_path(&self, id: GroupId) -> PathBuf {
        self.root.join(GROUPS_DIR).join(format!("{}.json", id))
    }

    fn member_path(&self, id: MemberId) -> PathBuf {
        self.root.join(MEMBERS_DIR).join(format!("{}.json", id))
    }

    fn player_path(&self, id: PlayerRecordId) -> PathBuf {
        self.root.join(PLAYERS_DIR).join(format!("{}.json", id))
    }

    /// Persist a region and publish it to the in-memory table.
    pub async fn save_region(&self, region: &Region) -> StorageResult<()> {
        write_atomic(&self.region_path(region.id), region, &region.id.to_string()).await?;
        self.tables.put_region(region.clone());
        Ok(())
    }

    pub async fn delete_region(&self, id: RegionId) -> StorageResult<()> {
        remove_file(&self.region_path(id)).await?;
        self.tables.delete_region(id);
        Ok(())
    }

    /// Persist a group and publish it to the in-memory table.
    pub async fn save_group(&self, group: &Group) -> StorageResult<()> {
        write_atomic(&self.group_path(group.id), group, &group.id.to_string()).await?;
        self.tables.put_group(group.clone());
        Ok(())
    }

    pub async fn delete_group(&self, id: GroupId) -> StorageResult<()> {
        remove_file(&self.group_path(id)).await?;
        self.tables.delete_group(id);
        Ok(())
    }

    /// Persist a member and publish it to the in-memory table.
    pub async fn save_member(&self, member: &Member) -> StorageResult<()> {
        write_atomic(&self.member_path(member.id), member, &member.id.to_string()).await?;
        self.tables.put_member(member.clone());
        Ok(())
    }

    pub async fn delete_member(&self, id: MemberId) -> StorageResult<()> {
        remove_file(&self.member_path(id)).await?;
        self.tables.delete_member(id);
        Ok(())
    }

    /// Persist a player record and publish it to the in-memory table.
    pub async fn save_player(&self, player: &PlayerRecord) -> StorageResult<()> {
        write_atomic(&self.player_path(player.id), player, &player.id.to_string()).await?;
        self.tables.put_player(player.clone());
        Ok(())
    }

    pub async fn delete_player(&self, id: PlayerRecordId) -> StorageResult<()> {
        remove_file(&self.player_path(id)).await?;
        self.tables.delete_player(id);
        Ok(())
    }
}

/// Load every `.json` document in a directory, skipping files that fail to
/// parse.
async fn load_dir<T: DeserializeOwned>(dir: &Path) -> StorageResult<Vec<T>> {
    let mut records = Vec::new();
    let mut entries = tokio_fs::read_dir(dir)
        .await
        .map_err(|e| StorageError::DirectoryRead(dir.to_path_buf(), e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StorageError::DirectoryRead(dir.to_path_buf(), e))?
    {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let contents = tokio_fs::read_to_string(&path)
            .await
            .map_err(|e| StorageError::FileRead(path.clone(), e))?;
        match serde_json::from_str(&contents) {
            Ok(record) => {
                debug!("Loaded record from {}", path.display());
                records.push(record);
            }
            Err(e) => {
                warn!("Skipping corrupt record {}: {}", path.display(), e);
            }
        }
    }

    Ok(records)
}

/// Serialize a record and move it into place with a temp-file rename.
async fn write_atomic<T: Serialize>(path: &Path, record: &T, descriptor: &str) -> StorageResult<()> {
    let temp_path = path.with_extension("tmp");

    let json = serde_json::to_string_pretty(record)
        .map_err(|e| StorageError::Serialization(descriptor.to_string(), e))?;

    let mut file = tokio_fs::File::create(&temp_path)
        .await
        .map_err(|e| StorageError::FileCreate(temp_path.clone(), e))?;

    file.write_all(json.as_bytes())
        .await
        .map_err(|e| StorageError::FileWrite(temp_path.clone(), e))?;

    file.sync_all()
        .await
        .map_err(|e| StorageError::FileSync(temp_path.clone(), e))?;

    tokio_fs::rename(&temp_path, path)
        .await
        .map_err(|e| StorageError::FileRename(temp_path, path.to_path_buf(), e))?;

    Ok(())
}

/// Delete a record file; a file already gone is not an error.
async fn remove_file(path: &Path) -> StorageResult<()> {
    match tokio_fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::FileDelete(path.to_path_buf(), e)),
    }
}

#[async_trait]
impl RegionStore for JsonStore {
    async fn select_all(&self, shard: ShardId) -> StorageResult<Vec<Region>> {
        RegionStore::select_all(&self.tables, shard).await
    }

    async fn select_by_id(&self, id: RegionId) -> StorageResult<Option<Region>> {
        RegionStore::select_by_id(&self.tables, id).await
    }

    async fn select_by_name(&self, name: &str) -> StorageResult<Option<Region>> {
        self.tables.select_by_name(name).await
    }
}

#[async_trait]
impl GroupStore for JsonStore {
    async fn select_all(&self) -> StorageResult<Vec<Group>> {
        GroupStore::select_all(&self.tables).await
    }

    async fn select_by_id(&self, id: GroupId) -> StorageResult<Option<Group>> {
        GroupStore::select_by_id(&self.tables, id).await
    }
}

#[async_trait]
impl MemberStore for JsonStore {
    async fn select_all(&self) -> StorageResult<Vec<Member>> {
        MemberStore::select_all(&self.tables).await
    }

    async fn select_by_id(&self, id: MemberId) -> StorageResult<Option<Member>> {
        MemberStore::select_by_id(&self.tables, id).await
    }
}

#[async_trait]
impl PlayerStore for JsonStore {
    async fn select_all(&self) -> StorageResult<Vec<PlayerRecord>> {
        PlayerStore::select_all(&self.tables).await
    }

    async fn select_by_id(&self, id: PlayerRecordId) -> StorageResult<Option<PlayerRecord>> {
        PlayerStore::select_by_id(&self.tables, id).await
    }

    async fn select_by_uuid(&self, uuid: PlayerId) -> StorageResult<Option<PlayerRecord>> {
        self.tables.select_by_uuid(uuid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freehold_types::CuboidBounds;

    fn region(id: i64, name: &str) -> Region {
        Region {
            id: RegionId(id),
            name: name.to_string(),
            owner: PlayerId::new(),
            parent: RegionId::NONE,
            world: freehold_types::WorldId::new(),
            shard: ShardId(1),
            bounds: CuboidBounds::new(0, 0, 0, 32, 64, 32),
            color: 0x3366CC,
            teleport: None,
            enter_message: "welcome".to_string(),
            leave_message: String::new(),
            environment_flags: Default::default(),
            guest_flags: Default::default(),
            settings: serde_json::json!({"rent": 120}),
        }
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let store = JsonStore::open(dir.path()).await.unwrap();
        let saved = region(4, "harbor");
        store.save_region(&saved).await.unwrap();
        drop(store);

        let reopened = JsonStore::open(dir.path()).await.unwrap();
        let loaded = RegionStore::select_by_id(&reopened, RegionId(4))
            .await
            .unwrap()
            .expect("record should survive reopen");
        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn corrupt_files_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();

        let store = JsonStore::open(dir.path()).await.unwrap();
        store.save_region(&region(1, "keep")).await.unwrap();
        drop(store);

        tokio_fs::write(dir.path().join("regions/9.json"), b"{ not json")
            .await
            .unwrap();

        let reopened = JsonStore::open(dir.path()).await.unwrap();
        let all = RegionStore::select_all(&reopened, ShardId(1)).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "keep");
    }

    #[tokio::test]
    async fn delete_removes_record_and_file() {
        let dir = tempfile::tempdir().unwrap();

        let store = JsonStore::open(dir.path()).await.unwrap();
        store.save_region(&region(2, "doomed")).await.unwrap();
        store.delete_region(RegionId(2)).await.unwrap();

        assert!(RegionStore::select_by_id(&store, RegionId(2))
            .await
            .unwrap()
            .is_none());
        // Deleting again is a no-op, not an error.
        store.delete_region(RegionId(2)).await.unwrap();

        let reopened = JsonStore::open(dir.path()).await.unwrap();
        assert_eq!(RegionStore::select_all(&reopened, ShardId(1)).await.unwrap().len(), 0);
    }
}
