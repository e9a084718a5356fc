//! Reference lookup endpoints (categories, companies, receivers, tags)

use api_types::reference::{ReferenceNew, ReferenceView, ReferencesResponse};
use axum::{Extension, Json, extract::State, http::StatusCode};
use engine::Reference;

use crate::{Owner, ServerError, server::ServerState};

fn map_reference(reference: Reference) -> ReferenceView {
    ReferenceView {
        id: reference.id,
        name: reference.name,
        created_at: reference.created_at,
    }
}

/// Generates the create and list handlers of a reference kind.
macro_rules! reference_handlers {
    ($new_handler:ident, $list_handler:ident, $new_fn:ident, $list_fn:ident) => {
        pub async fn $new_handler(
            Extension(owner): Extension<Owner>,
            State(state): State<ServerState>,
            Json(payload): Json<ReferenceNew>,
        ) -> Result<(StatusCode, Json<ReferenceView>), ServerError> {
            let reference = state.engine.$new_fn(&owner.0, &payload.name).await?;
            Ok((StatusCode::CREATED, Json(map_reference(reference))))
        }

        pub async fn $list_handler(
            Extension(owner): Extension<Owner>,
            State(state): State<ServerState>,
        ) -> Result<Json<ReferencesResponse>, ServerError> {
            let items = state.engine.$list_fn(&owner.0).await?;
            Ok(Json(ReferencesResponse {
                items: items.into_iter().map(map_reference).collect(),
            }))
        }
    };
}

reference_handlers!(category_new, category_list, new_category, list_categories);
reference_handlers!(company_new, company_list, new_company, list_companies);
reference_handlers!(receiver_new, receiver_list, new_receiver, list_receivers);
reference_handlers!(tag_new, tag_list, new_tag, list_tags);
