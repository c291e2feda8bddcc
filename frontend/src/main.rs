use yew::prelude::*;
use yew_router::prelude::*;

mod components;
mod pages;
mod services;

use components::{
    auth::{AuthContext, AuthProvider, LoginForm},
    impersonation::ImpersonationProvider,
    layout::Layout,
};
use pages::{dashboard::DashboardPage, magic_link::MagicLinkPage, users::UsersPage};

#[derive(Debug, Clone, Routable, PartialEq)]
pub enum Route {
    #[at("/")]
    Dashboard,
    #[at("/login")]
    Login,
    #[at("/admin/users")]
    Users,
    #[at("/auth/magic-link")]
    MagicLink,
    #[not_found]
    #[at("/404")]
    NotFound,
}

fn switch(routes: Route) -> Html {
    match routes {
        Route::Dashboard => html! { <RequireAuth><DashboardPage /></RequireAuth> },
        Route::Users => html! { <RequireAuth><UsersPage /></RequireAuth> },
        Route::Login => html! { <LoginPage /> },
        Route::MagicLink => html! { <MagicLinkPage /> },
        Route::NotFound => html! {
            <div class="min-h-screen flex items-center justify-center bg-gray-900">
                <div class="text-center">
                    <h1 class="text-6xl font-bold text-white">{"404"}</h1>
                    <p class="text-xl mt-4 text-gray-400">{"Page Not Found"}</p>
                </div>
            </div>
        },
    }
}

#[derive(Properties, PartialEq)]
struct RequireAuthProps {
    children: Html,
}

/// Wraps signed-in pages in the layout; everyone else goes to login.
#[function_component(RequireAuth)]
fn require_auth(props: &RequireAuthProps) -> Html {
    let auth_ctx = use_context::<AuthContext>().expect("AuthContext not found");

    if auth_ctx.is_loading {
        return html! {
            <div class="min-h-screen flex items-center justify-center bg-gray-900">
                <p class="text-gray-400">{"Loading..."}</p>
            </div>
        };
    }

    if auth_ctx.user.is_none() {
        return html! { <Redirect<Route> to={Route::Login} /> };
    }

    html! {
        <Layout>
            {props.children.clone()}
        </Layout>
    }
}

#[function_component(LoginPage)]
fn login_page() -> Html {
    let auth_ctx = use_context::<AuthContext>().expect("AuthContext not found");
    let navigator = use_navigator();

    let on_login = {
        let login = auth_ctx.login.clone();
        Callback::from(move |response| {
            login.emit(response);
            if let Some(navigator) = &navigator {
                navigator.push(&Route::Dashboard);
            }
        })
    };

    html! {
        <LoginForm {on_login} />
    }
}

#[function_component(App)]
fn app() -> Html {
    html! {
        <AuthProvider>
            <BrowserRouter>
                <ImpersonationProvider>
                    <Switch<Route> render={switch} />
                </ImpersonationProvider>
            </BrowserRouter>
        </AuthProvider>
    }
}

fn load_stylesheet(href: &str) -> Option<()> {
    let document = web_sys::window()?.document()?;
    let link = document.create_element("link").ok()?;
    link.set_attribute("href", href).ok()?;
    link.set_attribute("rel", "stylesheet").ok()?;
    document.head()?.append_child(&link).ok()?;
    Some(())
}

const TAILWIND_CSS: &str = "https://cdn.jsdelivr.net/npm/tailwindcss@2.2.19/dist/tailwind.min.css";

/// Routes `tracing` events, ours and the shared core's, to the browser console.
fn init_logging() {
    if tracing_wasm::try_set_as_global_default().is_err() {
        web_sys::console::warn_1(&"tracing subscriber already installed".into());
    }
}

fn main() {
    init_logging();

    if load_stylesheet(TAILWIND_CSS).is_none() {
        tracing::warn!("could not load stylesheet");
    }

    yew::Renderer::<App>::new().render();
}

#[cfg(test)]
mod tests {
    use super::*;
    use garageinn_shared::MAGIC_LINK_ROUTE;

    #[test]
    fn test_magic_link_route_matches_backend_links() {
        assert_eq!(Route::MagicLink.to_path(), MAGIC_LINK_ROUTE);
        assert_eq!(Route::recognize(MAGIC_LINK_ROUTE), Some(Route::MagicLink));
    }
}
