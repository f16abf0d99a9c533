//! Typed repositories for Organizations, Users, and Videos.

use std::collections::HashMap;

use chrono::Utc;
use vms_models::{
    Organization, OrganizationId, OrganizationSettings, Role, Sensitivity, SensitivityCategory,
    SensitivityLevel, SensitivityStatus, User, UserId, Video, VideoId, VideoStatus, Visibility,
};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{
    CollectionSelector, Document, Filter, FromFirestoreValue, Order, StructuredQuery,
    ToFirestoreValue, Value,
};

const ORGANIZATIONS: &str = "organizations";
const USERS: &str = "users";
const VIDEOS: &str = "videos";

fn get_string(fields: &HashMap<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(String::from_firestore_value)
}

fn get_bool(fields: &HashMap<String, Value>, key: &str) -> Option<bool> {
    fields.get(key).and_then(bool::from_firestore_value)
}

fn get_u64(fields: &HashMap<String, Value>, key: &str) -> Option<u64> {
    fields.get(key).and_then(u64::from_firestore_value)
}

fn get_f64(fields: &HashMap<String, Value>, key: &str) -> Option<f64> {
    fields.get(key).and_then(f64::from_firestore_value)
}

fn get_timestamp(
    fields: &HashMap<String, Value>,
    key: &str,
) -> Option<chrono::DateTime<Utc>> {
    fields
        .get(key)
        .and_then(chrono::DateTime::<Utc>::from_firestore_value)
}

fn get_string_array(fields: &HashMap<String, Value>, key: &str) -> Vec<String> {
    match fields.get(key) {
        Some(Value::ArrayValue(a)) => a
            .values
            .as_ref()
            .map(|vs| vs.iter().filter_map(String::from_firestore_value).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

// ============================================================================
// Organizations
// ============================================================================

pub struct OrganizationRepository {
    client: FirestoreClient,
}

impl OrganizationRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &OrganizationId) -> FirestoreResult<Option<Organization>> {
        let doc = self.client.get_document(ORGANIZATIONS, id.as_str()).await?;
        doc.as_ref().map(document_to_organization).transpose()
    }

    pub async fn find_by_slug(&self, slug: &str) -> FirestoreResult<Option<Organization>> {
        let query = StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: ORGANIZATIONS.to_string(),
            }],
            r#where: Some(Filter::equals("slug", slug.to_firestore_value())),
            limit: Some(1),
            ..Default::default()
        };
        let docs = self.client.run_query(query).await?;
        docs.first().map(document_to_organization).transpose()
    }

    pub async fn create(&self, org: &Organization) -> FirestoreResult<()> {
        let fields = organization_to_fields(org);
        self.client
            .create_document(ORGANIZATIONS, org.id.as_str(), fields)
            .await?;
        Ok(())
    }

    /// Atomically fill `owner_id` once the owner's User row exists.
    pub async fn set_owner(&self, id: &OrganizationId, owner_id: &UserId) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("owner_id".to_string(), owner_id.as_str().to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());
        self.client
            .update_document(
                ORGANIZATIONS,
                id.as_str(),
                fields,
                Some(vec!["owner_id".to_string(), "updated_at".to_string()]),
            )
            .await?;
        Ok(())
    }
}

fn organization_to_fields(org: &Organization) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("name".to_string(), org.name.to_firestore_value());
    fields.insert("slug".to_string(), org.slug.to_firestore_value());
    fields.insert(
        "owner_id".to_string(),
        org.owner_id.clone().to_firestore_value(),
    );
    fields.insert(
        "max_storage_gb".to_string(),
        org.settings.max_storage_gb.to_firestore_value(),
    );
    fields.insert(
        "max_video_size_mb".to_string(),
        org.settings.max_video_size_mb.to_firestore_value(),
    );
    fields.insert(
        "allowed_formats".to_string(),
        org.settings.allowed_formats.clone().to_firestore_value(),
    );
    fields.insert("active".to_string(), org.active.to_firestore_value());
    fields.insert("created_at".to_string(), org.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), org.updated_at.to_firestore_value());
    fields
}

fn document_to_organization(doc: &Document) -> FirestoreResult<Organization> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| FirestoreError::InvalidResponse("missing fields".into()))?;
    let id = doc
        .name
        .as_ref()
        .and_then(|n| n.rsplit('/').next())
        .ok_or_else(|| FirestoreError::InvalidResponse("missing document name".into()))?;

    Ok(Organization {
        id: OrganizationId::from(id),
        name: get_string(fields, "name").unwrap_or_default(),
        slug: get_string(fields, "slug").unwrap_or_default(),
        owner_id: get_string(fields, "owner_id"),
        settings: OrganizationSettings {
            max_storage_gb: get_u64(fields, "max_storage_gb").unwrap_or(100),
            max_video_size_mb: get_u64(fields, "max_video_size_mb").unwrap_or(2048),
            allowed_formats: get_string_array(fields, "allowed_formats"),
        },
        active: get_bool(fields, "active").unwrap_or(true),
        created_at: get_timestamp(fields, "created_at").unwrap_or_else(Utc::now),
        updated_at: get_timestamp(fields, "updated_at").unwrap_or_else(Utc::now),
    })
}

// ============================================================================
// Users
// ============================================================================

pub struct UserRepository {
    client: FirestoreClient,
}

impl UserRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &UserId) -> FirestoreResult<Option<User>> {
        let doc = self.client.get_document(USERS, id.as_str()).await?;
        doc.as_ref().map(document_to_user).transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> FirestoreResult<Option<User>> {
        let query = StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: USERS.to_string(),
            }],
            r#where: Some(Filter::equals(
                "email",
                email.to_lowercase().to_firestore_value(),
            )),
            limit: Some(1),
            ..Default::default()
        };
        let docs = self.client.run_query(query).await?;
        docs.first().map(document_to_user).transpose()
    }

    pub async fn create(&self, user: &User) -> FirestoreResult<()> {
        let fields = user_to_fields(user);
        self.client
            .create_document(USERS, user.id.as_str(), fields)
            .await?;
        Ok(())
    }

    pub async fn set_last_login(&self, id: &UserId) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("last_login_at".to_string(), Utc::now().to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());
        self.client
            .update_document(
                USERS,
                id.as_str(),
                fields,
                Some(vec!["last_login_at".to_string(), "updated_at".to_string()]),
            )
            .await?;
        Ok(())
    }

    /// Unconditionally set the one-slot refresh token. Used by
    /// register/login, which establish a fresh session rather than rotate
    /// an existing one, so there is no prior value to compare against; use
    /// [`Self::swap_refresh_token`] for the refresh flow instead.
    pub async fn set_refresh_token(&self, id: &UserId, token: &str) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("refresh_token_current".to_string(), token.to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());
        self.client
            .update_document(
                USERS,
                id.as_str(),
                fields,
                Some(vec![
                    "refresh_token_current".to_string(),
                    "updated_at".to_string(),
                ]),
            )
            .await?;
        Ok(())
    }

    /// Compare-and-swap the one-slot refresh token.
    ///
    /// Reads the document's current `updateTime`, checks
    /// `refresh_token_current == expected_current` in application code, then
    /// writes `new_token` with that `updateTime` as a precondition. A
    /// concurrent refresh racing on the same old token will have its write
    /// rejected with [`FirestoreError::PreconditionFailed`] because the
    /// first writer already advanced `updateTime` — that's the replay
    /// rejection, not the field comparison, which only short-circuits the
    /// common case of a token that's already been rotated.
    pub async fn swap_refresh_token(
        &self,
        id: &UserId,
        expected_current: &str,
        new_token: &str,
    ) -> FirestoreResult<()> {
        let doc = self
            .client
            .get_document(USERS, id.as_str())
            .await?
            .ok_or_else(|| FirestoreError::not_found(format!("{}/{}", USERS, id.as_str())))?;

        let current = document_to_user(&doc)?;
        if current.refresh_token_current.as_deref() != Some(expected_current) {
            return Err(FirestoreError::PreconditionFailed(format!(
                "refresh token for user {} no longer matches",
                id.as_str()
            )));
        }

        let mut fields = HashMap::new();
        fields.insert(
            "refresh_token_current".to_string(),
            new_token.to_firestore_value(),
        );
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        self.client
            .update_document_with_precondition(
                USERS,
                id.as_str(),
                fields,
                Some(vec![
                    "refresh_token_current".to_string(),
                    "updated_at".to_string(),
                ]),
                doc.update_time.as_deref(),
            )
            .await?;
        Ok(())
    }
}

fn user_to_fields(user: &User) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("email".to_string(), user.email.to_firestore_value());
    fields.insert(
        "password_hash".to_string(),
        user.password_hash.to_firestore_value(),
    );
    fields.insert("name".to_string(), user.name.to_firestore_value());
    fields.insert("role".to_string(), user.role.as_str().to_firestore_value());
    fields.insert(
        "organization_id".to_string(),
        user.organization_id.as_str().to_firestore_value(),
    );
    fields.insert("active".to_string(), user.active.to_firestore_value());
    fields.insert(
        "last_login_at".to_string(),
        user.last_login_at.to_firestore_value(),
    );
    fields.insert(
        "refresh_token_current".to_string(),
        user.refresh_token_current.clone().to_firestore_value(),
    );
    fields.insert("created_at".to_string(), user.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), user.updated_at.to_firestore_value());
    fields
}

fn document_to_user(doc: &Document) -> FirestoreResult<User> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| FirestoreError::InvalidResponse("missing fields".into()))?;
    let id = doc
        .name
        .as_ref()
        .and_then(|n| n.rsplit('/').next())
        .ok_or_else(|| FirestoreError::InvalidResponse("missing document name".into()))?;

    let role = match get_string(fields, "role").as_deref() {
        Some("admin") => Role::Admin,
        Some("editor") => Role::Editor,
        _ => Role::Viewer,
    };

    Ok(User {
        id: UserId::from(id),
        email: get_string(fields, "email").unwrap_or_default(),
        password_hash: get_string(fields, "password_hash").unwrap_or_default(),
        name: get_string(fields, "name").unwrap_or_default(),
        role,
        organization_id: OrganizationId::from(
            get_string(fields, "organization_id").unwrap_or_default(),
        ),
        active: get_bool(fields, "active").unwrap_or(true),
        last_login_at: get_timestamp(fields, "last_login_at"),
        refresh_token_current: get_string(fields, "refresh_token_current"),
        created_at: get_timestamp(fields, "created_at").unwrap_or_else(Utc::now),
        updated_at: get_timestamp(fields, "updated_at").unwrap_or_else(Utc::now),
    })
}

// ============================================================================
// Videos
// ============================================================================

/// Options for the `GET /api/videos` listing query.
#[derive(Debug, Clone, Default)]
pub struct VideoListFilter {
    pub status: Option<VideoStatus>,
    pub sensitivity_status: Option<SensitivityStatus>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub descending: bool,
    pub page: u32,
    pub limit: u32,
}

pub struct VideoRepository {
    client: FirestoreClient,
}

impl VideoRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &VideoId) -> FirestoreResult<Option<Video>> {
        let doc = self.client.get_document(VIDEOS, id.as_str()).await?;
        doc.as_ref().map(document_to_video).transpose()
    }

    pub async fn create(&self, video: &Video) -> FirestoreResult<()> {
        let fields = video_to_fields(video);
        self.client
            .create_document(VIDEOS, video.id.as_str(), fields)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: &VideoId) -> FirestoreResult<()> {
        self.client.delete_document(VIDEOS, id.as_str()).await
    }

    /// Tenant-scoped, filtered, sorted, paginated listing.
    ///
    /// Firestore's REST structured-query API has no `contains` operator, so
    /// free-text `search` is applied client-side over the tenant-and-status
    /// filtered page; pagination therefore counts post-filter, not
    /// pre-filter, rows (acceptable for the admin/listing use case this
    /// serves, not a hard invariant).
    pub async fn list_for_tenant(
        &self,
        organization_id: &OrganizationId,
        filter: &VideoListFilter,
    ) -> FirestoreResult<(Vec<Video>, u32)> {
        let sort_field = filter.sort_by.clone().unwrap_or_else(|| "created_at".to_string());
        let mut query = StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: VIDEOS.to_string(),
            }],
            r#where: Some(Filter::equals(
                "organization_id",
                organization_id.as_str().to_firestore_value(),
            )),
            order_by: vec![Order {
                field: crate::types::FieldReference {
                    field_path: sort_field,
                },
                direction: if filter.descending { "DESCENDING" } else { "ASCENDING" }.to_string(),
            }],
            ..Default::default()
        };
        // Status/sensitivity narrowing is applied client-side below because
        // Firestore REST only supports a single equality filter without a
        // composite index declared ahead of time for this collection.
        query.limit = Some(500);

        let docs = self.client.run_query(query).await?;
        let mut videos: Vec<Video> = docs
            .iter()
            .filter_map(|d| document_to_video(d).ok())
            .filter(|v| filter.status.is_none_or_eq(v.status))
            .filter(|v| {
                filter
                    .sensitivity_status
                    .is_none_or_eq(v.sensitivity.status)
            })
            .filter(|v| match &filter.search {
                Some(s) if !s.is_empty() => {
                    v.title.to_lowercase().contains(&s.to_lowercase())
                        || v.description.to_lowercase().contains(&s.to_lowercase())
                }
                _ => true,
            })
            .collect();

        let total = videos.len() as u32;
        let page = filter.page.max(1);
        let limit = filter.limit.max(1);
        let start = ((page - 1) * limit) as usize;
        if start < videos.len() {
            let end = (start + limit as usize).min(videos.len());
            videos = videos[start..end].to_vec();
        } else {
            videos.clear();
        }

        Ok((videos, total))
    }

    /// Every video currently `processing`, across all tenants. Used only by
    /// the stalled-job reconciliation task, which has no single tenant to
    /// scope a query to.
    pub async fn list_processing(&self) -> FirestoreResult<Vec<Video>> {
        let query = StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: VIDEOS.to_string(),
            }],
            r#where: Some(Filter::equals(
                "status",
                VideoStatus::Processing.as_str().to_firestore_value(),
            )),
            limit: Some(500),
            ..Default::default()
        };
        let docs = self.client.run_query(query).await?;
        Ok(docs.iter().filter_map(|d| document_to_video(d).ok()).collect())
    }

    pub async fn update_title_description_visibility(
        &self,
        id: &VideoId,
        title: Option<&str>,
        description: Option<&str>,
        visibility: Option<Visibility>,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        let mut mask = vec!["updated_at".to_string()];
        if let Some(t) = title {
            fields.insert("title".to_string(), t.to_firestore_value());
            mask.push("title".to_string());
        }
        if let Some(d) = description {
            fields.insert("description".to_string(), d.to_firestore_value());
            mask.push("description".to_string());
        }
        if let Some(v) = visibility {
            fields.insert("visibility".to_string(), v.as_str().to_firestore_value());
            mask.push("visibility".to_string());
        }
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());
        self.client
            .update_document(VIDEOS, id.as_str(), fields, Some(mask))
            .await?;
        Ok(())
    }

    /// Atomic field write: progress + stage, used throughout the worker
    /// pipeline so concurrent readers observe a consistent `(status,
    /// progress)` pair.
    pub async fn update_progress(
        &self,
        id: &VideoId,
        status: VideoStatus,
        progress: u8,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), status.as_str().to_firestore_value());
        fields.insert("processing_progress".to_string(), (progress as u64).to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());
        self.client
            .update_document(
                VIDEOS,
                id.as_str(),
                fields,
                Some(vec![
                    "status".to_string(),
                    "processing_progress".to_string(),
                    "updated_at".to_string(),
                ]),
            )
            .await?;
        Ok(())
    }

    pub async fn update_metadata(
        &self,
        id: &VideoId,
        metadata: &vms_models::ProbedMetadata,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert(
            "metadata".to_string(),
            serde_json::to_value(metadata)
                .map_err(|e| FirestoreError::SerializationError(e.to_string()))?
                .to_firestore_value(),
        );
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());
        self.client
            .update_document(
                VIDEOS,
                id.as_str(),
                fields,
                Some(vec!["metadata".to_string(), "updated_at".to_string()]),
            )
            .await?;
        Ok(())
    }

    pub async fn update_thumbnail_key(
        &self,
        id: &VideoId,
        thumbnail_key: &str,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert(
            "thumbnail_key".to_string(),
            thumbnail_key.to_firestore_value(),
        );
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());
        self.client
            .update_document(
                VIDEOS,
                id.as_str(),
                fields,
                Some(vec!["thumbnail_key".to_string(), "updated_at".to_string()]),
            )
            .await?;
        Ok(())
    }

    pub async fn update_sensitivity(
        &self,
        id: &VideoId,
        sensitivity: &Sensitivity,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert(
            "sensitivity".to_string(),
            serde_json::to_value(sensitivity)
                .map_err(|e| FirestoreError::SerializationError(e.to_string()))?
                .to_firestore_value(),
        );
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());
        self.client
            .update_document(
                VIDEOS,
                id.as_str(),
                fields,
                Some(vec!["sensitivity".to_string(), "updated_at".to_string()]),
            )
            .await?;
        Ok(())
    }

    pub async fn mark_completed(&self, id: &VideoId) -> FirestoreResult<()> {
        self.update_progress(id, VideoStatus::Completed, 100).await
    }

    pub async fn mark_failed(&self, id: &VideoId) -> FirestoreResult<()> {
        self.update_progress(id, VideoStatus::Failed, 0).await
    }

    /// Best-effort, non-atomic increment; spec.md §9 treats view_count as
    /// best-effort under retry/double-delivery.
    pub async fn increment_view_count(&self, id: &VideoId) -> FirestoreResult<()> {
        let video = self.get(id).await?;
        let Some(video) = video else {
            return Ok(());
        };
        let mut fields = HashMap::new();
        fields.insert(
            "view_count".to_string(),
            (video.view_count + 1).to_firestore_value(),
        );
        fields.insert("last_viewed_at".to_string(), Utc::now().to_firestore_value());
        self.client
            .update_document(
                VIDEOS,
                id.as_str(),
                fields,
                Some(vec!["view_count".to_string(), "last_viewed_at".to_string()]),
            )
            .await?;
        Ok(())
    }
}

fn video_to_fields(video: &Video) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("title".to_string(), video.title.to_firestore_value());
    fields.insert(
        "description".to_string(),
        video.description.to_firestore_value(),
    );
    fields.insert(
        "original_filename".to_string(),
        video.original_filename.to_firestore_value(),
    );
    fields.insert(
        "storage_key".to_string(),
        video.storage_key.to_firestore_value(),
    );
    fields.insert("file_size".to_string(), video.file_size.to_firestore_value());
    fields.insert("format".to_string(), video.format.to_firestore_value());
    fields.insert(
        "organization_id".to_string(),
        video.organization_id.as_str().to_firestore_value(),
    );
    fields.insert(
        "uploaded_by".to_string(),
        video.uploaded_by.as_str().to_firestore_value(),
    );
    fields.insert(
        "visibility".to_string(),
        video.visibility.as_str().to_firestore_value(),
    );
    fields.insert(
        "allowed_user_ids".to_string(),
        video
            .allowed_user_ids
            .iter()
            .map(|u| u.as_str().to_string())
            .collect::<Vec<_>>()
            .to_firestore_value(),
    );
    fields.insert(
        "status".to_string(),
        video.status.as_str().to_firestore_value(),
    );
    fields.insert(
        "processing_progress".to_string(),
        (video.processing_progress as u64).to_firestore_value(),
    );
    fields.insert(
        "metadata".to_string(),
        serde_json::to_value(&video.metadata)
            .unwrap_or(serde_json::Value::Null)
            .to_firestore_value(),
    );
    fields.insert(
        "thumbnail_key".to_string(),
        video.thumbnail_key.clone().to_firestore_value(),
    );
    fields.insert(
        "sensitivity".to_string(),
        serde_json::to_value(&video.sensitivity)
            .unwrap_or(serde_json::Value::Null)
            .to_firestore_value(),
    );
    fields.insert("view_count".to_string(), video.view_count.to_firestore_value());
    fields.insert(
        "last_viewed_at".to_string(),
        video.last_viewed_at.to_firestore_value(),
    );
    fields.insert("created_at".to_string(), video.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), video.updated_at.to_firestore_value());
    fields
}

fn document_to_video(doc: &Document) -> FirestoreResult<Video> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| FirestoreError::InvalidResponse("missing fields".into()))?;
    let id = doc
        .name
        .as_ref()
        .and_then(|n| n.rsplit('/').next())
        .ok_or_else(|| FirestoreError::InvalidResponse("missing document name".into()))?;

    let status = match get_string(fields, "status").as_deref() {
        Some("uploading") => VideoStatus::Uploading,
        Some("processing") => VideoStatus::Processing,
        Some("completed") => VideoStatus::Completed,
        Some("failed") => VideoStatus::Failed,
        _ => VideoStatus::Processing,
    };
    let visibility = get_string(fields, "visibility")
        .as_deref()
        .and_then(Visibility::parse)
        .unwrap_or(Visibility::Organization);

    let metadata = fields
        .get("metadata")
        .and_then(firestore_value_to_json)
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    let sensitivity = fields
        .get("sensitivity")
        .and_then(firestore_value_to_json)
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_else(|| Sensitivity {
            level: SensitivityLevel::Unknown,
            score: get_f64(fields, "sensitivity_score").unwrap_or(0.0),
            status: SensitivityStatus::Pending,
            categories: Vec::<SensitivityCategory>::new(),
            analysis_details: String::new(),
            analyzed_at: None,
            reviewed_by: None,
            review_notes: None,
        });

    Ok(Video {
        id: VideoId::from(id),
        title: get_string(fields, "title").unwrap_or_default(),
        description: get_string(fields, "description").unwrap_or_default(),
        original_filename: get_string(fields, "original_filename").unwrap_or_default(),
        storage_key: get_string(fields, "storage_key").unwrap_or_default(),
        file_size: get_u64(fields, "file_size").unwrap_or(0),
        format: get_string(fields, "format").unwrap_or_default(),
        organization_id: OrganizationId::from(
            get_string(fields, "organization_id").unwrap_or_default(),
        ),
        uploaded_by: UserId::from(get_string(fields, "uploaded_by").unwrap_or_default()),
        visibility,
        allowed_user_ids: get_string_array(fields, "allowed_user_ids")
            .into_iter()
            .map(UserId::from)
            .collect(),
        status,
        processing_progress: get_u64(fields, "processing_progress").unwrap_or(0) as u8,
        metadata,
        thumbnail_key: get_string(fields, "thumbnail_key"),
        sensitivity,
        view_count: get_u64(fields, "view_count").unwrap_or(0),
        last_viewed_at: get_timestamp(fields, "last_viewed_at"),
        created_at: get_timestamp(fields, "created_at").unwrap_or_else(Utc::now),
        updated_at: get_timestamp(fields, "updated_at").unwrap_or_else(Utc::now),
    })
}

/// Best-effort round-trip of a Firestore `Value` back into `serde_json`,
/// covering the subset (map/array/string/number/bool/null) our documents
/// use for nested structs like `metadata`/`sensitivity`.
fn firestore_value_to_json(value: &Value) -> Option<serde_json::Value> {
    Some(match value {
        Value::NullValue(()) => serde_json::Value::Null,
        Value::BooleanValue(b) => serde_json::Value::Bool(*b),
        Value::IntegerValue(s) => serde_json::Value::Number(s.parse::<i64>().ok()?.into()),
        Value::DoubleValue(f) => serde_json::Number::from_f64(*f).map(serde_json::Value::Number)?,
        Value::StringValue(s) | Value::TimestampValue(s) | Value::ReferenceValue(s) => {
            serde_json::Value::String(s.clone())
        }
        Value::BytesValue(s) => serde_json::Value::String(s.clone()),
        Value::GeoPointValue(_) => serde_json::Value::Null,
        Value::ArrayValue(a) => serde_json::Value::Array(
            a.values
                .as_ref()
                .map(|vs| vs.iter().filter_map(firestore_value_to_json).collect())
                .unwrap_or_default(),
        ),
        Value::MapValue(m) => serde_json::Value::Object(
            m.fields
                .as_ref()
                .map(|fs| {
                    fs.iter()
                        .filter_map(|(k, v)| firestore_value_to_json(v).map(|v| (k.clone(), v)))
                        .collect()
                })
                .unwrap_or_default(),
        ),
    })
}

/// `impl ToFirestoreValue for serde_json::Value`, local to this module since
/// neither type lives in this crate isn't true for `Value` — kept here to
/// stay next to its only caller.
impl ToFirestoreValue for serde_json::Value {
    fn to_firestore_value(&self) -> Value {
        match self {
            serde_json::Value::Null => Value::NullValue(()),
            serde_json::Value::Bool(b) => Value::BooleanValue(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::IntegerValue(i.to_string())
                } else {
                    Value::DoubleValue(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::StringValue(s.clone()),
            serde_json::Value::Array(a) => Value::ArrayValue(crate::types::ArrayValue {
                values: Some(a.iter().map(|v| v.to_firestore_value()).collect()),
            }),
            serde_json::Value::Object(o) => Value::MapValue(crate::types::MapValue {
                fields: Some(
                    o.iter()
                        .map(|(k, v)| (k.clone(), v.to_firestore_value()))
                        .collect(),
                ),
            }),
        }
    }
}

trait OptionEqExt<T> {
    fn is_none_or_eq(&self, other: T) -> bool;
}

impl<T: PartialEq> OptionEqExt<T> for Option<T> {
    fn is_none_or_eq(&self, other: T) -> bool {
        match self {
            None => true,
            Some(v) => *v == other,
        }
    }
}
