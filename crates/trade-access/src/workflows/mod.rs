pub mod grant;
