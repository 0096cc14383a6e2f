//! OpenAPI document for the ingestion surface.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::submit::submit_form,
        crate::handlers::jobs::trigger_orphan_scan,
        crate::handlers::jobs::get_orphan_scan_results,
        crate::handlers::jobs::get_orphan_files,
        crate::handlers::health::health,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::handlers::submit::SubmitResponse,
        crate::handlers::jobs::TriggerOrphanScanRequest,
        crate::handlers::jobs::TriggerOrphanScanResponse,
    )),
    tags(
        (name = "submissions", description = "Public form submission intake"),
        (name = "admin", description = "Admin job management"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_covers_public_surface() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/forms/{form_id}"));
        assert!(paths.iter().any(|p| p.as_str() == "/admin/jobs/orphan-scan"));
        assert!(paths.iter().any(|p| p.as_str() == "/health"));
    }
}
