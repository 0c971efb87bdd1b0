use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;

mod clans;
mod games;
mod hooks;
mod memberships;
mod players;
mod server;

/// Function for configuring the provided service config with all the
/// application routes.
pub fn router() -> Router {
    Router::new()
        .route("/healthcheck", get(server::healthcheck))
        .route("/games", post(games::create_game))
        .route("/games/:game_id", put(games::update_game))
        .nest(
            "/games/:game_id",
            Router::new()
                // Webhook management
                .route("/hooks", get(hooks::list_hooks).post(hooks::create_hook))
                .route("/hooks/:hook_public_id", delete(hooks::delete_hook))
                // Players
                .route("/players", post(players::create_player))
                .route(
                    "/players/:player_public_id",
                    get(players::get_player).put(players::update_player),
                )
                // Clans
                .route("/clans", get(clans::list_clans).post(clans::create_clan))
                .route("/clans/search", get(clans::search_clans))
                .route("/clans/summaries", get(clans::clans_summaries))
                .route(
                    "/clans/:clan_public_id",
                    get(clans::clan_details).put(clans::update_clan),
                )
                .route("/clans/:clan_public_id/summary", get(clans::clan_summary))
                .route(
                    "/clans/:clan_public_id/membership-count",
                    post(clans::adjust_membership_count),
                )
                .route("/clans/:clan_public_id/leave", post(clans::leave_clan))
                .route(
                    "/clans/:clan_public_id/transfer-ownership",
                    post(clans::transfer_ownership),
                )
                // Membership state machine
                .route(
                    "/clans/:clan_public_id/memberships/application",
                    post(memberships::apply),
                )
                .route(
                    "/clans/:clan_public_id/memberships/application/:action",
                    post(memberships::decide_application),
                )
                .route(
                    "/clans/:clan_public_id/memberships/invitation",
                    post(memberships::invite),
                )
                .route(
                    "/clans/:clan_public_id/memberships/invitation/:action",
                    post(memberships::decide_invitation),
                )
                .route(
                    "/clans/:clan_public_id/memberships/delete",
                    post(memberships::delete),
                )
                .route(
                    "/clans/:clan_public_id/memberships/promote",
                    post(memberships::promote),
                )
                .route(
                    "/clans/:clan_public_id/memberships/demote",
                    post(memberships::demote),
                ),
        )
        .layer(CorsLayer::permissive())
}
