fn main() {
    ollama_chat::run()
}
