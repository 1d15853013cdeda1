//! Users, generated images, favorites and collections on top of
//! `LocalFileStorage`.
//!
//! Everything a user owns lives under `users/<id>/`, so deleting that prefix
//! cascades to all of it. Uniqueness (favorites, collection items, names) is
//! enforced with exclusive file creation.

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    Collection, CollectionItem, Favorite, FavoriteEntry, GeneratedImageRecord, Page, Style, User,
    UserStats,
};
use crate::store::{LocalFileStorage, compute_hash};

type StoreResult<T> = Result<T, StoreError>;

fn user_key(user_id: Uuid) -> String {
    format!("users/{user_id}/user.json")
}

fn username_index_key(username: &str) -> String {
    format!("index/usernames/{}.json", compute_hash(username))
}

fn email_index_key(email: &str) -> String {
    format!("index/emails/{}.json", compute_hash(email))
}

fn images_prefix(user_id: Uuid) -> String {
    format!("users/{user_id}/images")
}

fn image_key(user_id: Uuid, image_id: Uuid) -> String {
    format!("users/{user_id}/images/{image_id}.json")
}

fn favorites_prefix(user_id: Uuid) -> String {
    format!("users/{user_id}/favorites")
}

fn favorite_key(user_id: Uuid, image_id: Uuid) -> String {
    format!("users/{user_id}/favorites/{image_id}.json")
}

fn collections_prefix(user_id: Uuid) -> String {
    format!("users/{user_id}/collections")
}

fn collection_key(user_id: Uuid, collection_id: Uuid) -> String {
    format!("users/{user_id}/collections/{collection_id}.json")
}

fn collection_name_key(user_id: Uuid, name: &str) -> String {
    format!("users/{user_id}/collection_names/{}.json", compute_hash(name))
}

fn collection_items_prefix(user_id: Uuid, collection_id: Uuid) -> String {
    format!("users/{user_id}/collection_items/{collection_id}")
}

fn collection_item_key(user_id: Uuid, collection_id: Uuid, image_id: Uuid) -> String {
    format!("users/{user_id}/collection_items/{collection_id}/{image_id}.json")
}

pub struct Repository {
    storage: LocalFileStorage,
    // serializes read-modify-write of collection records
    collection_lock: Mutex<()>,
}

impl Repository {
    pub fn new(storage: LocalFileStorage) -> Self {
        Self {
            storage,
            collection_lock: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &LocalFileStorage {
        &self.storage
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.storage.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn write<T: Serialize>(&self, key: &str, record: &T) -> StoreResult<()> {
        let payload = serde_json::to_vec_pretty(record)?;
        self.storage.put(key, &payload).await?;
        Ok(())
    }

    async fn write_new<T: Serialize>(&self, key: &str, record: &T) -> StoreResult<bool> {
        let payload = serde_json::to_vec_pretty(record)?;
        Ok(self.storage.put_new(key, &payload).await?)
    }

    /// Every parsable record under `prefix`; unreadable entries are skipped.
    async fn list<T: DeserializeOwned>(&self, prefix: &str) -> StoreResult<Vec<T>> {
        let blobs = self.storage.list(prefix).await?;
        let mut records = Vec::with_capacity(blobs.len());
        for bytes in blobs {
            match serde_json::from_slice::<T>(&bytes) {
                Ok(record) => records.push(record),
                Err(err) => warn!("skipping malformed record under {}: {}", prefix, err),
            }
        }
        Ok(records)
    }

    // ----- users -----

    pub async fn create_user(&self, username: &str, email: &str) -> StoreResult<User> {
        let username = username.trim();
        let email = email.trim().to_lowercase();
        if username.is_empty() || email.is_empty() {
            return Err(StoreError::InvalidInput(
                "username and email are required".to_string(),
            ));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.clone(),
            created_at: Utc::now(),
        };
        let username_marker = username_index_key(username);
        if !self.write_new(&username_marker, &user.id).await? {
            return Err(StoreError::UsernameTaken);
        }
        if !self.write_new(&email_index_key(&email), &user.id).await? {
            self.storage.remove(&username_marker).await?;
            return Err(StoreError::EmailTaken);
        }
        self.write(&user_key(user.id), &user).await?;
        debug!("created user {}", user.id);
        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> StoreResult<User> {
        self.read(&user_key(user_id))
            .await?
            .ok_or(StoreError::UserNotFound)
    }

    /// Deletes the user together with every image, favorite and collection
    /// they own.
    pub async fn delete_user(&self, user_id: Uuid) -> StoreResult<()> {
        let user = self.get_user(user_id).await?;
        self.storage
            .remove_prefix(&format!("users/{user_id}"))
            .await?;
        self.storage
            .remove(&username_index_key(&user.username))
            .await?;
        self.storage.remove(&email_index_key(&user.email)).await?;
        debug!("deleted user {} and owned records", user_id);
        Ok(())
    }

    // ----- images -----

    pub async fn create_image(
        &self,
        user_id: Uuid,
        original_prompt: &str,
        improved_prompt: &str,
        image_url: &str,
        ai_enhanced: bool,
        style: Style,
    ) -> StoreResult<GeneratedImageRecord> {
        if !self.storage.exists(&user_key(user_id)).await? {
            return Err(StoreError::UserNotFound);
        }
        let record = GeneratedImageRecord {
            id: Uuid::new_v4(),
            user_id,
            original_prompt: original_prompt.to_string(),
            improved_prompt: improved_prompt.to_string(),
            image_url: image_url.to_string(),
            ai_enhanced,
            style,
            created_at: Utc::now(),
        };
        self.write(&image_key(user_id, record.id), &record).await?;
        Ok(record)
    }

    /// Looks up an image owned by `user_id`; other users' images are not found.
    pub async fn get_image(&self, user_id: Uuid, image_id: Uuid) -> StoreResult<GeneratedImageRecord> {
        self.read(&image_key(user_id, image_id))
            .await?
            .ok_or(StoreError::ImageNotFound)
    }

    pub async fn list_images(
        &self,
        user_id: Uuid,
        page: usize,
        per_page: usize,
    ) -> StoreResult<Page<GeneratedImageRecord>> {
        let mut images: Vec<GeneratedImageRecord> = self.list(&images_prefix(user_id)).await?;
        images.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Page::paginate(images, page, per_page))
    }

    // ----- favorites -----

    pub async fn add_favorite(&self, user_id: Uuid, image_id: Uuid) -> StoreResult<Favorite> {
        self.get_image(user_id, image_id).await?;
        let favorite = Favorite {
            id: Uuid::new_v4(),
            user_id,
            image_id,
            created_at: Utc::now(),
        };
        if !self
            .write_new(&favorite_key(user_id, image_id), &favorite)
            .await?
        {
            return Err(StoreError::AlreadyFavorited);
        }
        Ok(favorite)
    }

    pub async fn remove_favorite(&self, user_id: Uuid, image_id: Uuid) -> StoreResult<()> {
        if self.storage.remove(&favorite_key(user_id, image_id)).await? {
            Ok(())
        } else {
            Err(StoreError::FavoriteNotFound)
        }
    }

    pub async fn list_favorites(
        &self,
        user_id: Uuid,
        page: usize,
        per_page: usize,
    ) -> StoreResult<Page<FavoriteEntry>> {
        let mut favorites: Vec<Favorite> = self.list(&favorites_prefix(user_id)).await?;
        favorites.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let page = Page::paginate(favorites, page, per_page);

        let mut items = Vec::with_capacity(page.items.len());
        for favorite in page.items {
            match self.get_image(user_id, favorite.image_id).await {
                Ok(image) => items.push(FavoriteEntry {
                    id: favorite.id,
                    image,
                    added_at: favorite.created_at,
                }),
                Err(StoreError::ImageNotFound) => {
                    warn!("favorite {} points at a missing image", favorite.id)
                }
                Err(err) => return Err(err),
            }
        }
        Ok(Page {
            items,
            total: page.total,
            pages: page.pages,
            current_page: page.current_page,
        })
    }

    // ----- collections -----

    pub async fn create_collection(
        &self,
        user_id: Uuid,
        name: &str,
        description: &str,
        is_public: bool,
    ) -> StoreResult<Collection> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidInput(
                "collection name is required".to_string(),
            ));
        }
        if !self.storage.exists(&user_key(user_id)).await? {
            return Err(StoreError::UserNotFound);
        }
        let now = Utc::now();
        let collection = Collection {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            description: description.trim().to_string(),
            is_public,
            created_at: now,
            updated_at: now,
        };
        if !self
            .write_new(&collection_name_key(user_id, name), &collection.id)
            .await?
        {
            return Err(StoreError::CollectionNameTaken);
        }
        self.write(&collection_key(user_id, collection.id), &collection)
            .await?;
        Ok(collection)
    }

    pub async fn get_collection(
        &self,
        user_id: Uuid,
        collection_id: Uuid,
    ) -> StoreResult<Collection> {
        self.read(&collection_key(user_id, collection_id))
            .await?
            .ok_or(StoreError::CollectionNotFound)
    }

    pub async fn list_collections(&self, user_id: Uuid) -> StoreResult<Vec<Collection>> {
        let mut collections: Vec<Collection> = self.list(&collections_prefix(user_id)).await?;
        collections.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(collections)
    }

    pub async fn add_to_collection(
        &self,
        user_id: Uuid,
        collection_id: Uuid,
        image_id: Uuid,
    ) -> StoreResult<CollectionItem> {
        let _guard = self.collection_lock.lock().await;
        let mut collection = self.get_collection(user_id, collection_id).await?;
        self.get_image(user_id, image_id).await?;

        let item = CollectionItem {
            id: Uuid::new_v4(),
            collection_id,
            image_id,
            added_at: Utc::now(),
        };
        if !self
            .write_new(&collection_item_key(user_id, collection_id, image_id), &item)
            .await?
        {
            return Err(StoreError::AlreadyInCollection);
        }
        collection.updated_at = item.added_at;
        self.write(&collection_key(user_id, collection_id), &collection)
            .await?;
        Ok(item)
    }

    pub async fn remove_from_collection(
        &self,
        user_id: Uuid,
        collection_id: Uuid,
        image_id: Uuid,
    ) -> StoreResult<()> {
        let _guard = self.collection_lock.lock().await;
        let mut collection = self.get_collection(user_id, collection_id).await?;
        if !self
            .storage
            .remove(&collection_item_key(user_id, collection_id, image_id))
            .await?
        {
            return Err(StoreError::NotInCollection);
        }
        collection.updated_at = Utc::now();
        self.write(&collection_key(user_id, collection_id), &collection)
            .await
    }

    pub async fn list_collection_images(
        &self,
        user_id: Uuid,
        collection_id: Uuid,
        page: usize,
        per_page: usize,
    ) -> StoreResult<Page<GeneratedImageRecord>> {
        self.get_collection(user_id, collection_id).await?;
        let mut items: Vec<CollectionItem> = self
            .list(&collection_items_prefix(user_id, collection_id))
            .await?;
        items.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        let page = Page::paginate(items, page, per_page);

        let mut images = Vec::with_capacity(page.items.len());
        for item in page.items {
            images.push(self.get_image(user_id, item.image_id).await?);
        }
        Ok(Page {
            items: images,
            total: page.total,
            pages: page.pages,
            current_page: page.current_page,
        })
    }

    pub async fn stats(&self, user_id: Uuid) -> StoreResult<UserStats> {
        self.get_user(user_id).await?;
        Ok(UserStats {
            total_images: self.storage.count(&images_prefix(user_id)).await?,
            total_favorites: self.storage.count(&favorites_prefix(user_id)).await?,
            total_collections: self.storage.count(&collections_prefix(user_id)).await?,
        })
    }
}
