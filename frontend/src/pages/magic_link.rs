use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;
use yew_router::prelude::*;

use crate::components::AuthContext;
use crate::services::auth;
use crate::Route;

/// Pulls `token` out of a query string such as `?token=abc&next=/`.
pub fn token_from_query(query: &str) -> Option<String> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "token")
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

#[function_component(MagicLinkPage)]
pub fn magic_link_page() -> Html {
    let auth_ctx = use_context::<AuthContext>().expect("AuthContext not found");
    let navigator = use_navigator();
    let error_message = use_state(|| None::<String>);

    {
        let login = auth_ctx.login.clone();
        let error_message = error_message.clone();
        use_effect_with((), move |_| {
            let token = web_sys::window()
                .and_then(|w| w.location().search().ok())
                .and_then(|query| token_from_query(&query));

            match token {
                None => {
                    error_message.set(Some("This sign-in link is missing its token".to_string()))
                }
                Some(token) => spawn_local(async move {
                    match auth::exchange_magic_link(token).await {
                        Ok(response) => {
                            login.emit(response);
                            if let Some(navigator) = navigator {
                                navigator.replace(&Route::Dashboard);
                            }
                        }
                        Err(e) => error_message.set(Some(e.message)),
                    }
                }),
            }
            || ()
        });
    }

    html! {
        <div class="min-h-screen flex items-center justify-center bg-gray-50">
            <div class="max-w-md w-full text-center space-y-4">
                if let Some(error) = (*error_message).clone() {
                    <div class="bg-red-50 border border-red-200 text-red-700 px-4 py-3 rounded">
                        {error}
                    </div>
                    <Link<Route> to={Route::Login} classes="text-blue-600 hover:underline">
                        {"Back to sign in"}
                    </Link<Route>>
                } else {
                    <p class="text-gray-600">{"Signing you in..."}</p>
                }
            </div>
        </div>
    }
}
