#[actix_web::main]
async fn main() -> std::io::Result<()> {
    report_converter::run().await
}
