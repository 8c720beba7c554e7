//! Catalog of the collectable resource types and their API endpoints.

/// Prefix shared by every headless-delivery endpoint.
const API_PREFIX: &str = "/o/headless-delivery/v1.0";

/// The resource types a run can collect. Documents are nested under
/// document folders rather than listed site-wide, so they have no
/// site-level listing endpoint of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    StructuredContents,
    ContentFolders,
    SitePages,
    DocumentFolders,
    Documents,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::StructuredContents,
        ResourceKind::ContentFolders,
        ResourceKind::SitePages,
        ResourceKind::DocumentFolders,
        ResourceKind::Documents,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::StructuredContents => "structured contents",
            ResourceKind::ContentFolders => "content folders",
            ResourceKind::SitePages => "site pages",
            ResourceKind::DocumentFolders => "document folders",
            ResourceKind::Documents => "documents",
        }
    }

    /// Name of the dataset file this resource is saved under.
    pub fn file_name(self) -> &'static str {
        match self {
            ResourceKind::StructuredContents => "structured_contents.json",
            ResourceKind::ContentFolders => "content_folders.json",
            ResourceKind::SitePages => "site_pages.json",
            ResourceKind::DocumentFolders => "document_folders.json",
            ResourceKind::Documents => "all_documents.json",
        }
    }

    /// Site-level listing endpoint, or None for per-folder resources.
    pub fn listing_endpoint(self, site_id: &str) -> Option<String> {
        let segment = match self {
            ResourceKind::StructuredContents => "structured-contents",
            ResourceKind::ContentFolders => "structured-content-folders",
            ResourceKind::SitePages => "site-pages",
            ResourceKind::DocumentFolders => "document-folders",
            ResourceKind::Documents => return None,
        };
        Some(format!("{}/sites/{}/{}", API_PREFIX, site_id, segment))
    }
}

/// Documents listing for one document folder.
pub fn documents_endpoint(folder_id: i64) -> String {
    format!("{}/document-folders/{}/documents", API_PREFIX, folder_id)
}

/// Endpoints probed before a run to confirm the API answers at all,
/// cheapest and most specific first.
pub fn access_probes(site_id: &str) -> [String; 3] {
    [
        format!("{}/sites/{}", API_PREFIX, site_id),
        format!("{}/sites", API_PREFIX),
        "/api/jsonws/user/get-current-user".to_string(),
    ]
}

/// Page sizes per resource type. Site pages carry full page definitions
/// and paginate in smaller steps.
#[derive(Debug, Clone, Copy)]
pub struct PageSizes {
    pub structured_contents: u32,
    pub content_folders: u32,
    pub site_pages: u32,
    pub document_folders: u32,
    pub documents: u32,
}

impl PageSizes {
    pub fn for_kind(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::StructuredContents => self.structured_contents,
            ResourceKind::ContentFolders => self.content_folders,
            ResourceKind::SitePages => self.site_pages,
            ResourceKind::DocumentFolders => self.document_folders,
            ResourceKind::Documents => self.documents,
        }
    }
}

impl Default for PageSizes {
    fn default() -> Self {
        Self {
            structured_contents: 20,
            content_folders: 10,
            site_pages: 10,
            document_folders: 20,
            documents: 20,
        }
    }
}

/// Which resource types a run should collect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Selection {
    pub structured_contents: bool,
    pub content_folders: bool,
    pub site_pages: bool,
    pub document_folders: bool,
    pub documents: bool,
}

impl Selection {
    pub fn all() -> Self {
        Self {
            structured_contents: true,
            content_folders: true,
            site_pages: true,
            document_folders: true,
            documents: true,
        }
    }

    pub fn includes(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::StructuredContents => self.structured_contents,
            ResourceKind::ContentFolders => self.content_folders,
            ResourceKind::SitePages => self.site_pages,
            ResourceKind::DocumentFolders => self.document_folders,
            ResourceKind::Documents => self.documents,
        }
    }

    pub fn is_empty(&self) -> bool {
        !ResourceKind::ALL.iter().any(|kind| self.includes(*kind))
    }
}
