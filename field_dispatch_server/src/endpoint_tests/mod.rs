mod dispatch;
mod helpers;
mod webhook;
